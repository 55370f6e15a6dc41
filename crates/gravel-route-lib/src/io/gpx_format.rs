//! GPX encoding and decoding
//!
//! GPX has no loop flag: a closed loop is written with a duplicate closing track point and
//! loop state is inferred on import.

use super::{ImportedRoute, points_with_closing};
use crate::geodesy::RoutePoint;
use crate::history::RouteSnapshot;
use crate::{Result, RouteError};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use std::io::{Read, Write};

const GPX_CREATOR: &str = "gravel-route";

/// Write the route as a GPX 1.1 document with a single track and segment
pub fn write_gpx<W: Write>(writer: W, snapshot: &RouteSnapshot, name: Option<&str>) -> Result<()> {
    let mut segment = TrackSegment::new();
    segment.points = points_with_closing(snapshot)
        .into_iter()
        .map(|p| Waypoint::new(p.into()))
        .collect();

    let mut track = Track::new();
    track.name = name.map(str::to_string);
    track.segments.push(segment);

    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.creator = Some(GPX_CREATOR.to_string());
    gpx.tracks.push(track);

    gpx::write(&gpx, writer)?;
    Ok(())
}

/// Read a GPX document.
///
/// Track points from every track and segment are concatenated in document order. Files
/// without tracks fall back to their route (`rte`) points.
pub fn read_gpx<R: Read>(reader: R) -> Result<ImportedRoute> {
    let gpx = gpx::read(reader)?;

    let mut points: Vec<RoutePoint> = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(waypoint_to_route_point)
        .collect();

    if points.is_empty() {
        points = gpx
            .routes
            .iter()
            .flat_map(|route| &route.points)
            .map(waypoint_to_route_point)
            .collect();
    }

    if points.is_empty() {
        return Err(RouteError::EmptyRoute);
    }

    let name = gpx
        .tracks
        .iter()
        .find_map(|t| t.name.clone())
        .or_else(|| gpx.routes.iter().find_map(|r| r.name.clone()))
        .or_else(|| gpx.metadata.as_ref().and_then(|m| m.name.clone()));

    Ok(ImportedRoute::infer_loop(name, points))
}

#[inline]
fn waypoint_to_route_point(waypoint: &Waypoint) -> RoutePoint {
    waypoint.point().into()
}
