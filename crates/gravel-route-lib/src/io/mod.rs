//! Route file import and export
//!
//! Stateless collaborators that convert between a [`RouteSnapshot`] and the GPX and
//! GeoJSON exchange formats. Neither format has a loop flag the other side can rely on, so
//! closed loops are written with an explicit duplicate closing point and loop state is
//! recovered on import (see [`ImportedRoute`]).

mod geojson_format;
mod gpx_format;

pub use geojson_format::{from_geojson, read_geojson, to_geojson, write_geojson};
pub use gpx_format::{read_gpx, write_gpx};

use crate::engine::MIN_LOOP_POINTS;
use crate::geodesy::RoutePoint;
use crate::history::RouteSnapshot;
use crate::{Result, RouteError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A route decoded from a file, ready for [`crate::RouteEngine::load_route`]
///
/// When `loop_closed` is true the duplicate closing point has already been stripped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedRoute {
    pub name: Option<String>,
    pub points: Vec<RoutePoint>,
    pub loop_closed: bool,
}

impl ImportedRoute {
    /// Build from raw points, inferring a loop when the first and last points coincide
    pub(crate) fn infer_loop(name: Option<String>, mut points: Vec<RoutePoint>) -> Self {
        let loop_closed = is_geometrically_closed(&points);
        if loop_closed {
            points.pop();
        }
        Self {
            name,
            points,
            loop_closed,
        }
    }

    pub fn into_snapshot(self) -> RouteSnapshot {
        RouteSnapshot {
            points: self.points,
            loop_closed: self.loop_closed,
        }
    }
}

/// First and last points are equal and a valid loop remains after dropping the duplicate.
///
/// Shorter closed paths (e.g. an out-and-back `A-B-A`) stay open routes.
pub fn is_geometrically_closed(points: &[RoutePoint]) -> bool {
    points.len() > MIN_LOOP_POINTS && points.first() == points.last()
}

/// Points to serialize: closed loops get the first point appended again
pub(crate) fn points_with_closing(snapshot: &RouteSnapshot) -> Vec<RoutePoint> {
    let mut points = snapshot.points.clone();
    if snapshot.loop_closed
        && let Some(first) = snapshot.points.first()
    {
        points.push(*first);
    }
    points
}

/// Supported route file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteFormat {
    Gpx,
    GeoJson,
}

impl RouteFormat {
    /// Detect the format from a file extension (`.gpx`, `.geojson`, `.json`)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "gpx" => Ok(Self::Gpx),
            "geojson" | "json" => Ok(Self::GeoJson),
            _ => Err(RouteError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::GeoJson => "geojson",
        }
    }
}

/// Decode a route in the given format
pub fn read_route<R: Read>(reader: R, format: RouteFormat) -> Result<ImportedRoute> {
    match format {
        RouteFormat::Gpx => read_gpx(reader),
        RouteFormat::GeoJson => read_geojson(reader),
    }
}

/// Encode a route in the given format
pub fn write_route<W: Write>(
    writer: W,
    format: RouteFormat,
    snapshot: &RouteSnapshot,
    name: Option<&str>,
) -> Result<()> {
    match format {
        RouteFormat::Gpx => write_gpx(writer, snapshot, name),
        RouteFormat::GeoJson => write_geojson(writer, snapshot, name),
    }
}

/// Read a route file, detecting the format from its extension
pub fn read_route_file(path: &Path) -> Result<ImportedRoute> {
    let format = RouteFormat::from_path(path)?;
    let file = File::open(path)?;
    let route = read_route(BufReader::new(file), format)?;
    tracing::info!(
        "Imported {} points from {} (loop: {})",
        route.points.len(),
        path.display(),
        route.loop_closed
    );
    Ok(route)
}

/// Write a route file, detecting the format from its extension
pub fn write_route_file(path: &Path, snapshot: &RouteSnapshot, name: Option<&str>) -> Result<()> {
    let format = RouteFormat::from_path(path)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_route(&mut writer, format, snapshot, name)?;
    writer.flush()?;
    tracing::info!(
        "Exported {} points to {}",
        snapshot.points.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<RoutePoint> {
        vec![
            RoutePoint::new(59.0, 18.0),
            RoutePoint::new(59.0, 18.01),
            RoutePoint::new(59.01, 18.01),
            RoutePoint::new(59.01, 18.0),
        ]
    }

    #[test]
    fn test_infer_loop_strips_duplicate() {
        let mut points = square();
        points.push(points[0]);
        let route = ImportedRoute::infer_loop(None, points);
        assert!(route.loop_closed);
        assert_eq!(route.points, square());
    }

    #[test]
    fn test_infer_loop_keeps_out_and_back_open() {
        let a = RoutePoint::new(59.0, 18.0);
        let b = RoutePoint::new(59.01, 18.0);
        let route = ImportedRoute::infer_loop(None, vec![a, b, a]);
        assert!(!route.loop_closed);
        assert_eq!(route.points.len(), 3);
    }

    #[test]
    fn test_open_route_untouched() {
        let route = ImportedRoute::infer_loop(Some("open".into()), square());
        assert!(!route.loop_closed);
        assert_eq!(route.points, square());
        assert_eq!(route.name.as_deref(), Some("open"));
    }

    #[test]
    fn test_points_with_closing() {
        let open = RouteSnapshot {
            points: square(),
            loop_closed: false,
        };
        assert_eq!(points_with_closing(&open).len(), 4);

        let closed = RouteSnapshot {
            points: square(),
            loop_closed: true,
        };
        let points = points_with_closing(&closed);
        assert_eq!(points.len(), 5);
        assert_eq!(points[4], points[0]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            RouteFormat::from_path(Path::new("ride.gpx")).unwrap(),
            RouteFormat::Gpx
        );
        assert_eq!(
            RouteFormat::from_path(Path::new("ride.GeoJSON")).unwrap(),
            RouteFormat::GeoJson
        );
        assert_eq!(
            RouteFormat::from_path(Path::new("ride.json")).unwrap(),
            RouteFormat::GeoJson
        );
        assert!(matches!(
            RouteFormat::from_path(Path::new("ride.kml")),
            Err(RouteError::UnsupportedFormat(_))
        ));
        assert!(RouteFormat::from_path(Path::new("ride")).is_err());
    }

    #[test]
    fn test_route_file_roundtrip_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = RouteSnapshot {
            points: square(),
            loop_closed: true,
        };

        for format in [RouteFormat::Gpx, RouteFormat::GeoJson] {
            let path = dir.path().join(format!("loop.{}", format.extension()));
            write_route_file(&path, &snapshot, Some("Square")).unwrap();
            let imported = read_route_file(&path).unwrap();
            assert_eq!(imported.name.as_deref(), Some("Square"));
            assert_eq!(imported.into_snapshot(), snapshot);
        }
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_route_file(Path::new("/nonexistent/route.gpx"));
        assert!(matches!(result, Err(RouteError::Io(_))));
    }
}
