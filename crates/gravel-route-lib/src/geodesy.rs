//! Geodesic primitives shared by every distance computation in the crate
//!
//! All segment lengths, cumulative distances and marker placements go through a single
//! [`DistanceFn`] so that the numbers shown per segment and the marker positions never drift
//! apart.

use geo::{BoundingRect, Coord, LineString, Point, Rect};
use serde::{Deserialize, Serialize};

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate in degrees
///
/// Points carry no identity beyond their position; routes may hold coincident duplicates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lon: f64,
}

impl RoutePoint {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<Point<f64>> for RoutePoint {
    fn from(point: Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl From<RoutePoint> for Point<f64> {
    fn from(point: RoutePoint) -> Self {
        Point::new(point.lon, point.lat)
    }
}

impl From<Coord<f64>> for RoutePoint {
    fn from(coord: Coord<f64>) -> Self {
        Self::new(coord.y, coord.x)
    }
}

impl From<RoutePoint> for Coord<f64> {
    fn from(point: RoutePoint) -> Self {
        Coord {
            x: point.lon,
            y: point.lat,
        }
    }
}

/// Distance between two coordinates in meters
pub trait DistanceFn {
    fn distance(&self, a: &RoutePoint, b: &RoutePoint) -> f64;
}

/// Great-circle distance on a spherical Earth
#[derive(Clone, Copy, Debug, Default)]
pub struct Haversine;

impl DistanceFn for Haversine {
    #[inline]
    fn distance(&self, a: &RoutePoint, b: &RoutePoint) -> f64 {
        haversine_distance(a, b)
    }
}

/// Calculate the Haversine distance between two points in meters
#[inline]
pub fn haversine_distance(p1: &RoutePoint, p2: &RoutePoint) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let delta_lat = (p2.lat - p1.lat).to_radians();
    let delta_lon = (p2.lon - p1.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Linearly interpolate latitude and longitude independently
///
/// This is planar interpolation on the degree values, not a great-circle slerp. At marker
/// spacing (around a kilometer) the difference is far below rendering precision.
#[inline]
pub fn interpolate(a: &RoutePoint, b: &RoutePoint, ratio: f64) -> RoutePoint {
    RoutePoint::new(
        a.lat + (b.lat - a.lat) * ratio,
        a.lon + (b.lon - a.lon) * ratio,
    )
}

/// Point halfway between `a` and `b`, used when splitting a segment
#[inline]
pub fn midpoint(a: &RoutePoint, b: &RoutePoint) -> RoutePoint {
    interpolate(a, b, 0.5)
}

/// Bounding box of the points in degrees (x = lon, y = lat)
pub fn bounding_rect(points: &[RoutePoint]) -> Option<Rect<f64>> {
    let line: LineString<f64> = points.iter().map(|p| Coord::from(*p)).collect();
    line.bounding_rect()
}
