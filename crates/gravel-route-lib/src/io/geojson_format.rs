//! GeoJSON encoding and decoding
//!
//! Routes are written as a single `Feature` with a `LineString` geometry. The loop state is
//! stored in the `loopClosed` property for a faithful round trip, and closed loops also
//! carry an explicit closing coordinate so other tools draw them closed.

use super::{ImportedRoute, is_geometrically_closed, points_with_closing};
use crate::engine::MIN_LOOP_POINTS;
use crate::geodesy::RoutePoint;
use crate::history::RouteSnapshot;
use crate::{Result, RouteError};
use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue, Value};
use std::io::{Read, Write};

const LOOP_CLOSED_PROPERTY: &str = "loopClosed";
const NAME_PROPERTY: &str = "name";

/// Encode the route as a GeoJSON `Feature`
pub fn to_geojson(snapshot: &RouteSnapshot, name: Option<&str>) -> GeoJson {
    let coordinates: Vec<Vec<f64>> = points_with_closing(snapshot)
        .into_iter()
        .map(|p| vec![p.lon, p.lat])
        .collect();

    let mut properties = JsonObject::new();
    properties.insert(
        LOOP_CLOSED_PROPERTY.to_string(),
        JsonValue::Bool(snapshot.loop_closed),
    );
    if let Some(name) = name {
        properties.insert(NAME_PROPERTY.to_string(), JsonValue::from(name));
    }

    GeoJson::Feature(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Decode a route from a GeoJSON document.
///
/// Accepts a `Feature`, the first line feature of a `FeatureCollection`, or a bare
/// geometry. `LineString` and `MultiLineString` geometries are supported; the parts of a
/// multi-line are concatenated. An explicit `loopClosed` property takes precedence over
/// geometric closure.
pub fn from_geojson(geojson: &GeoJson) -> Result<ImportedRoute> {
    let (geometry, properties) = match geojson {
        GeoJson::Feature(feature) => (feature.geometry.as_ref(), feature.properties.as_ref()),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .find(|f| f.geometry.as_ref().is_some_and(is_line_geometry))
            .map(|f| (f.geometry.as_ref(), f.properties.as_ref()))
            .unwrap_or((None, None)),
        GeoJson::Geometry(geometry) => (Some(geometry), None),
    };

    let mut points = geometry.map(line_points).unwrap_or_default();
    if points.is_empty() {
        return Err(RouteError::EmptyRoute);
    }

    let name = properties
        .and_then(|p| p.get(NAME_PROPERTY))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    let explicit_loop = properties
        .and_then(|p| p.get(LOOP_CLOSED_PROPERTY))
        .and_then(JsonValue::as_bool);

    match explicit_loop {
        Some(true) => {
            // A closing duplicate is only stripped when a valid loop remains;
            // a short out-and-back like A-B-A stays open and intact.
            let has_duplicate = points.len() > 1 && points.first() == points.last();
            let loop_closed = if has_duplicate {
                points.len() > MIN_LOOP_POINTS
            } else {
                points.len() >= MIN_LOOP_POINTS
            };
            if has_duplicate && loop_closed {
                points.pop();
            }
            if !loop_closed {
                tracing::warn!(
                    "GeoJSON route marked as loop has only {} points; importing as open",
                    points.len()
                );
            }
            Ok(ImportedRoute {
                name,
                points,
                loop_closed,
            })
        }
        Some(false) => Ok(ImportedRoute {
            name,
            points,
            loop_closed: false,
        }),
        None => {
            if is_geometrically_closed(&points) {
                tracing::debug!("GeoJSON route has no loop property; inferred loop from geometry");
            }
            Ok(ImportedRoute::infer_loop(name, points))
        }
    }
}

/// Serialize the route as pretty-printed GeoJSON
pub fn write_geojson<W: Write>(
    writer: W,
    snapshot: &RouteSnapshot,
    name: Option<&str>,
) -> Result<()> {
    serde_json::to_writer_pretty(writer, &to_geojson(snapshot, name))?;
    Ok(())
}

/// Parse a GeoJSON document and decode the route
pub fn read_geojson<R: Read>(mut reader: R) -> Result<ImportedRoute> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let geojson: GeoJson = content.parse()?;
    from_geojson(&geojson)
}

fn is_line_geometry(geometry: &Geometry) -> bool {
    matches!(
        geometry.value,
        Value::LineString(_) | Value::MultiLineString(_)
    )
}

fn line_points(geometry: &Geometry) -> Vec<RoutePoint> {
    match &geometry.value {
        Value::LineString(line) => positions_to_points(line),
        Value::MultiLineString(lines) => lines
            .iter()
            .flat_map(|line| positions_to_points(line))
            .collect(),
        _ => {
            tracing::warn!("Ignoring GeoJSON geometry that is not a line");
            Vec::new()
        }
    }
}

/// GeoJSON positions are `[lon, lat, (elevation)]`; malformed positions are skipped
fn positions_to_points(positions: &[Vec<f64>]) -> Vec<RoutePoint> {
    positions
        .iter()
        .filter_map(|position| match position.as_slice() {
            [lon, lat, ..] => Some(RoutePoint::new(*lat, *lon)),
            _ => {
                tracing::warn!("Skipping malformed GeoJSON position {:?}", position);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_points() -> Vec<RoutePoint> {
        vec![
            RoutePoint::new(59.0, 18.0),
            RoutePoint::new(59.001, 18.0),
            RoutePoint::new(59.002, 18.0),
        ]
    }

    #[test]
    fn test_export_closed_loop() {
        let snapshot = RouteSnapshot {
            points: three_points(),
            loop_closed: true,
        };
        let GeoJson::Feature(feature) = to_geojson(&snapshot, Some("Loop")) else {
            panic!("expected a feature");
        };

        assert_eq!(
            feature.property(LOOP_CLOSED_PROPERTY),
            Some(&JsonValue::Bool(true))
        );
        assert_eq!(feature.property(NAME_PROPERTY), Some(&JsonValue::from("Loop")));

        let Some(Value::LineString(coords)) = feature.geometry.map(|g| g.value) else {
            panic!("expected a line string");
        };
        assert_eq!(coords.len(), 4);
        assert_eq!(coords[0], vec![18.0, 59.0]);
        assert_eq!(coords[3], coords[0]);
    }

    #[test]
    fn test_roundtrip_keeps_loop_flag() {
        let snapshot = RouteSnapshot {
            points: three_points(),
            loop_closed: true,
        };
        let imported = from_geojson(&to_geojson(&snapshot, None)).unwrap();
        assert!(imported.loop_closed);
        assert_eq!(imported.points, three_points());
    }

    #[test]
    fn test_infers_loop_without_property() {
        let json = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "LineString",
                "coordinates": [[18.0, 59.0], [18.0, 59.001], [18.001, 59.002], [18.0, 59.0]]
            }
        }"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert!(imported.loop_closed);
        assert_eq!(imported.points.len(), 3);
        assert_eq!(imported.points[0], RoutePoint::new(59.0, 18.0));
        assert_ne!(imported.points.last(), imported.points.first());
    }

    #[test]
    fn test_explicit_false_keeps_closing_coordinate() {
        let json = r#"{
            "type": "Feature",
            "properties": {"loopClosed": false},
            "geometry": {
                "type": "LineString",
                "coordinates": [[18.0, 59.0], [18.0, 59.001], [18.001, 59.002], [18.0, 59.0]]
            }
        }"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert!(!imported.loop_closed);
        assert_eq!(imported.points.len(), 4);
    }

    #[test]
    fn test_explicit_loop_on_too_few_points_is_open() {
        let json = r#"{
            "type": "Feature",
            "properties": {"loopClosed": true},
            "geometry": {"type": "LineString", "coordinates": [[18.0, 59.0], [18.0, 59.001]]}
        }"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert!(!imported.loop_closed);
        assert_eq!(imported.points.len(), 2);
    }

    #[test]
    fn test_explicit_loop_on_out_and_back_keeps_return_leg() {
        let json = r#"{
            "type": "Feature",
            "properties": {"loopClosed": true},
            "geometry": {
                "type": "LineString",
                "coordinates": [[18.0, 59.0], [18.0, 59.001], [18.0, 59.0]]
            }
        }"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert!(!imported.loop_closed);
        assert_eq!(imported.points.len(), 3);
        assert_eq!(imported.points.first(), imported.points.last());
    }

    #[test]
    fn test_feature_collection_and_multiline() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"name": "Cafe"},
                    "geometry": {"type": "Point", "coordinates": [18.0, 59.0]}
                },
                {
                    "type": "Feature",
                    "properties": {"name": "Gravel loop"},
                    "geometry": {
                        "type": "MultiLineString",
                        "coordinates": [
                            [[18.0, 59.0, 12.5], [18.0, 59.001]],
                            [[18.001, 59.002]]
                        ]
                    }
                }
            ]
        }"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert_eq!(imported.name.as_deref(), Some("Gravel loop"));
        assert_eq!(imported.points.len(), 3);
        assert_eq!(imported.points[2], RoutePoint::new(59.002, 18.001));
    }

    #[test]
    fn test_bare_geometry() {
        let json = r#"{"type": "LineString", "coordinates": [[18.0, 59.0], [18.1, 59.1]]}"#;
        let imported = read_geojson(json.as_bytes()).unwrap();
        assert_eq!(imported.points.len(), 2);
        assert!(imported.name.is_none());
    }

    #[test]
    fn test_no_line_geometry_is_empty_route() {
        let json = r#"{"type": "Point", "coordinates": [18.0, 59.0]}"#;
        assert!(matches!(
            read_geojson(json.as_bytes()),
            Err(RouteError::EmptyRoute)
        ));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(read_geojson("{ nope".as_bytes()).is_err());
    }
}
