//! Subcommand implementations
//!
//! Each command drives the library the way the interactive editor does: decode a file,
//! load it into a [`RouteEngine`], then read the engine's derived state.

use crate::settings::{Command, Settings};
use gravel_route_lib::format::{format_distance, segment_labels, total_label};
use gravel_route_lib::storage::{FileStorage, RouteLibrary, StorageError};
use gravel_route_lib::{EngineConfig, RouteEngine, RouteError, geodesy, io};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid distance interval: {0} km")]
    InvalidInterval(f64),

    #[error("No saved route named {0:?}")]
    RouteNotFound(String),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// Run the parsed command, writing human-readable output to `out`
pub fn run<W: Write>(settings: &Settings, out: &mut W) -> CliResult<()> {
    profiling::scope!("commands::run");
    match &settings.command {
        Command::Info { file, interval_km } => info(file, *interval_km, out),
        Command::Convert {
            input,
            output,
            name,
        } => convert(input, output, name.as_deref(), out),
        Command::Save { file, name } => {
            let library = open_library(settings.store.clone())?;
            save(&library, file, name, out)
        }
        Command::List => {
            let library = open_library(settings.store.clone())?;
            list(&library, out)
        }
        Command::Export { name, output } => {
            let library = open_library(settings.store.clone())?;
            export(&library, name, output, out)
        }
        Command::Delete { name } => {
            let library = open_library(settings.store.clone())?;
            delete(&library, name, out)
        }
    }
}

fn open_library(store: Option<PathBuf>) -> CliResult<RouteLibrary> {
    let storage = FileStorage::new_with_path(store)?;
    tracing::debug!("Using route library at {}", storage.path().display());
    Ok(RouteLibrary::new(Box::new(storage)))
}

fn load_engine(file: &Path, interval_km: f64) -> CliResult<(RouteEngine, Option<String>)> {
    if !interval_km.is_finite() || interval_km <= 0.0 {
        return Err(CliError::InvalidInterval(interval_km));
    }
    let imported = io::read_route_file(file)?;
    let mut engine = RouteEngine::with_config(EngineConfig {
        distance_interval_km: interval_km,
        ..Default::default()
    });
    engine.load_route(imported.points, imported.loop_closed);
    Ok((engine, imported.name))
}

pub fn info<W: Write>(file: &Path, interval_km: f64, out: &mut W) -> CliResult<()> {
    let (mut engine, name) = load_engine(file, interval_km)?;

    writeln!(out, "Route:    {}", name.as_deref().unwrap_or("(unnamed)"))?;
    writeln!(out, "Points:   {}", engine.points().len())?;
    writeln!(
        out,
        "Loop:     {}",
        if engine.loop_closed() { "closed" } else { "open" }
    )?;

    let labels = segment_labels(engine.segment_distances());
    let count = labels.len();
    for (i, label) in labels.iter().enumerate() {
        let closing = engine.loop_closed() && i + 1 == count;
        let to = if closing { 0 } else { i + 1 };
        writeln!(out, "  #{:<4} {:>4} -> {:<4} {}", i, i, to, label)?;
    }
    writeln!(out, "Total:    {}", total_label(engine.segment_distances()))?;

    if let Some(bounds) = geodesy::bounding_rect(engine.points()) {
        writeln!(
            out,
            "Bounds:   lat {:.5}..{:.5}, lon {:.5}..{:.5}",
            bounds.min().y,
            bounds.max().y,
            bounds.min().x,
            bounds.max().x
        )?;
    }
    writeln!(
        out,
        "Size:     {:.1}",
        engine.calculate_dynamic_point_size()
    )?;

    let markers = engine.generate_distance_markers().to_vec();
    writeln!(
        out,
        "Markers:  {} every {}",
        markers.len(),
        format_distance(engine.distance_interval_km() * 1000.0)
    )?;
    for (i, marker) in markers.iter().enumerate() {
        let at = (i + 1) as f64 * engine.distance_interval_km() * 1000.0;
        writeln!(
            out,
            "  {:>10}  {:.6}, {:.6}",
            format_distance(at),
            marker.lat,
            marker.lon
        )?;
    }
    Ok(())
}

pub fn convert<W: Write>(
    input: &Path,
    output: &Path,
    name: Option<&str>,
    out: &mut W,
) -> CliResult<()> {
    let imported = io::read_route_file(input)?;
    let name = name.map(str::to_string).or_else(|| imported.name.clone());
    let snapshot = imported.into_snapshot();
    io::write_route_file(output, &snapshot, name.as_deref())?;
    writeln!(
        out,
        "Wrote {} points ({}) to {}",
        snapshot.points.len(),
        if snapshot.loop_closed { "loop" } else { "open" },
        output.display()
    )?;
    Ok(())
}

pub fn save<W: Write>(
    library: &RouteLibrary,
    file: &Path,
    name: &str,
    out: &mut W,
) -> CliResult<()> {
    let imported = io::read_route_file(file)?;
    let saved = library.save(name, &imported.into_snapshot())?;
    writeln!(
        out,
        "Saved {:?}: {} points, {}",
        saved.name,
        saved.snapshot.points.len(),
        format_distance(saved.distance_meters)
    )?;
    Ok(())
}

pub fn list<W: Write>(library: &RouteLibrary, out: &mut W) -> CliResult<()> {
    let names = library.list()?;
    if names.is_empty() {
        writeln!(out, "No saved routes")?;
    }
    for name in names {
        match library.load(&name)? {
            Some(saved) => writeln!(
                out,
                "{:<30} {:>6} pts {:>10}{}",
                saved.name,
                saved.snapshot.points.len(),
                format_distance(saved.distance_meters),
                if saved.snapshot.loop_closed { "  loop" } else { "" }
            )?,
            None => tracing::warn!("Route {:?} disappeared while listing", name),
        }
    }
    Ok(())
}

pub fn export<W: Write>(
    library: &RouteLibrary,
    name: &str,
    output: &Path,
    out: &mut W,
) -> CliResult<()> {
    let saved = library
        .load(name)?
        .ok_or_else(|| CliError::RouteNotFound(name.to_string()))?;
    io::write_route_file(output, &saved.snapshot, Some(&saved.name))?;
    writeln!(out, "Exported {:?} to {}", saved.name, output.display())?;
    Ok(())
}

pub fn delete<W: Write>(library: &RouteLibrary, name: &str, out: &mut W) -> CliResult<()> {
    if !library.delete(name)? {
        return Err(CliError::RouteNotFound(name.to_string()));
    }
    writeln!(out, "Deleted {:?}", name)?;
    Ok(())
}
