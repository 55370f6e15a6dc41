//! Human-readable distance labels

/// Values below this many meters are shown in meters
pub const METERS_DISPLAY_THRESHOLD: f64 = 950.0;

/// Format a distance in meters.
///
/// Below 950 m the value is shown as whole meters. From there up to 10 km it is shown in
/// kilometers with two decimals, and with one decimal beyond that.
pub fn format_distance(meters: f64) -> String {
    if meters < METERS_DISPLAY_THRESHOLD {
        format!("{:.0} m", meters.max(0.0))
    } else {
        let km = meters / 1000.0;
        if km < 10.0 {
            format!("{:.2} km", km)
        } else {
            format!("{:.1} km", km)
        }
    }
}

/// One label per segment distance
pub fn segment_labels(segment_distances: &[f64]) -> Vec<String> {
    segment_distances.iter().copied().map(format_distance).collect()
}

/// Label for the whole path; always the sum of the given segments
pub fn total_label(segment_distances: &[f64]) -> String {
    format_distance(segment_distances.iter().sum())
}
