//! Gravel Route Library - Route Measurement Engine
//!
//! This library owns the state of an interactively built gravel-bike route: the ordered
//! point sequence, open/closed loop topology, per-segment geodesic distances and evenly
//! spaced distance markers. Everything around it (rendering, map tiles, cloud sync) is
//! a consumer that reads the engine's public state after each mutation.
//!
//! # Architecture
//!
//! - **[`RouteEngine`]**: In-memory, single-owner mutable session for one edited route
//! - **[`geodesy`]**: The shared distance primitive plus interpolation helpers
//! - **[`RouteHistory`]**: Caller-owned undo/redo stack of [`RouteSnapshot`]s
//! - **[`io`]**: Stateless GPX and GeoJSON encode/decode collaborators
//! - **[`storage`]**: Key/value persistence for saved routes and autosave
//! - **[`format`]**: Human-readable distance labels
//!
//! # Error Policy
//!
//! Engine operations never fail: stale or out-of-range indices are defined no-ops.
//! Only the file and storage collaborators return errors.

mod engine;
pub mod format;
pub mod geodesy;
mod history;
pub mod io;
pub mod storage;

// Public API exports
pub use engine::{
    DEFAULT_POINT_SIZE, EngineConfig, MAX_DISTANCE_MARKERS, MIN_LOOP_POINTS, RouteEngine,
    TapOutcome,
};
pub use geodesy::{DistanceFn, Haversine, RoutePoint};
pub use history::{RouteHistory, RouteSnapshot};
pub use io::{ImportedRoute, RouteFormat};

/// Error types for route import and export
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported route format: {0}")]
    UnsupportedFormat(String),

    #[error("Empty route")]
    EmptyRoute,
}

pub type Result<T> = std::result::Result<T, RouteError>;
