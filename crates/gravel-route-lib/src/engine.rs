//! Route measurement engine
//!
//! [`RouteEngine`] is the mutable session behind the route editor. It owns the ordered
//! point sequence, the loop flag, and the derived segment distances and distance markers.
//!
//! Every operation is total. Out-of-range indices, toggling a loop on too few points and
//! undoing on an empty route are silent no-ops, because the UI routinely hands in indices
//! that went stale one gesture ago.

use crate::geodesy::{self, DistanceFn, Haversine, RoutePoint};
use crate::history::RouteSnapshot;
use serde::{Deserialize, Serialize};

/// Minimum number of points for a route to be a closed loop
pub const MIN_LOOP_POINTS: usize = 3;

/// Marker size used when density is undefined (0 or 1 points)
pub const DEFAULT_POINT_SIZE: f64 = 18.0;
const MIN_POINT_SIZE: f64 = 12.0;
const MAX_POINT_SIZE: f64 = 36.0;
/// Average spacing (meters) at which the size curve leaves its lower bound
const POINT_SIZE_REFERENCE_SPACING_M: f64 = 10.0;
/// Size gained per tenfold increase of average spacing
const POINT_SIZE_PER_DECADE: f64 = 6.0;

/// Upper bound on markers produced by one [`RouteEngine::generate_distance_markers`] call
pub const MAX_DISTANCE_MARKERS: usize = 100_000;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Spacing between distance markers in kilometers (strictly positive)
    pub distance_interval_km: f64,
    /// Whether markers should be displayed. Has no effect on computation.
    pub show_distance_markers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            distance_interval_km: 1.0,
            show_distance_markers: true,
        }
    }
}

/// Result of dispatching a map tap through [`RouteEngine::handle_map_tap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// A point was appended at this index
    Added(usize),
    /// The selected point at this index was moved and the selection cleared
    Moved(usize),
    /// Neither measuring nor an active edit selection; nothing changed
    Ignored,
}

/// Owned state of one route editing session
#[derive(Debug, Clone)]
pub struct RouteEngine<D: DistanceFn = Haversine> {
    distance_fn: D,
    points: Vec<RoutePoint>,
    loop_closed: bool,
    segment_distances: Vec<f64>,
    distance_markers: Vec<RoutePoint>,
    measure_enabled: bool,
    edit_mode_enabled: bool,
    editing_index: Option<usize>,
    distance_interval_km: f64,
    show_distance_markers: bool,
}

impl Default for RouteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteEngine {
    /// Create an empty engine using haversine distances and default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an empty engine with the given configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_distance_fn(Haversine, config)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<D: DistanceFn> RouteEngine<D> {
    /// Create an empty engine with a custom distance primitive
    pub fn with_distance_fn(distance_fn: D, config: EngineConfig) -> Self {
        let distance_interval_km =
            if config.distance_interval_km.is_finite() && config.distance_interval_km > 0.0 {
                config.distance_interval_km
            } else {
                tracing::warn!(
                    "Ignoring invalid distance interval {} km, using default",
                    config.distance_interval_km
                );
                EngineConfig::default().distance_interval_km
            };

        Self {
            distance_fn,
            points: Vec::new(),
            loop_closed: false,
            segment_distances: Vec::new(),
            distance_markers: Vec::new(),
            measure_enabled: false,
            edit_mode_enabled: false,
            editing_index: None,
            distance_interval_km,
            show_distance_markers: config.show_distance_markers,
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    #[inline]
    pub fn loop_closed(&self) -> bool {
        self.loop_closed
    }

    /// One entry per consecutive pair, plus the closing segment when looped
    #[inline]
    pub fn segment_distances(&self) -> &[f64] {
        &self.segment_distances
    }

    /// Markers from the last [`Self::generate_distance_markers`] call
    #[inline]
    pub fn distance_markers(&self) -> &[RoutePoint] {
        &self.distance_markers
    }

    #[inline]
    pub fn measure_enabled(&self) -> bool {
        self.measure_enabled
    }

    #[inline]
    pub fn edit_mode_enabled(&self) -> bool {
        self.edit_mode_enabled
    }

    #[inline]
    pub fn editing_index(&self) -> Option<usize> {
        self.editing_index
    }

    #[inline]
    pub fn distance_interval_km(&self) -> f64 {
        self.distance_interval_km
    }

    #[inline]
    pub fn show_distance_markers(&self) -> bool {
        self.show_distance_markers
    }

    /// Total path length in meters, including the closing segment when looped
    pub fn total_distance(&self) -> f64 {
        self.segment_distances.iter().sum()
    }

    #[inline]
    pub fn distance_fn(&self) -> &D {
        &self.distance_fn
    }

    // ------------------------------------------------------------------
    // Mode flags
    // ------------------------------------------------------------------

    pub fn set_measure_enabled(&mut self, enabled: bool) {
        self.measure_enabled = enabled;
    }

    /// Turning edit mode off always drops the current selection.
    pub fn set_edit_mode_enabled(&mut self, enabled: bool) {
        self.edit_mode_enabled = enabled;
        if !enabled {
            self.editing_index = None;
        }
    }

    /// Select a point for moving.
    ///
    /// `Some(i)` is only accepted while edit mode is on and `i` is a valid index;
    /// `None` is always accepted. Returns whether the selection was applied.
    pub fn set_editing_index(&mut self, index: Option<usize>) -> bool {
        match index {
            None => {
                self.editing_index = None;
                true
            }
            Some(i) if self.edit_mode_enabled && i < self.points.len() => {
                self.editing_index = Some(i);
                true
            }
            Some(i) => {
                tracing::debug!(
                    "Rejected editing index {} (edit mode: {}, points: {})",
                    i,
                    self.edit_mode_enabled,
                    self.points.len()
                );
                false
            }
        }
    }

    pub fn set_show_distance_markers(&mut self, show: bool) {
        self.show_distance_markers = show;
    }

    /// Set the marker spacing. Non-finite or non-positive values are rejected and the
    /// previous interval is kept.
    pub fn set_distance_interval_km(&mut self, km: f64) -> bool {
        if !km.is_finite() || km <= 0.0 {
            tracing::warn!("Rejected distance interval {} km", km);
            return false;
        }
        self.distance_interval_km = km;
        true
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Append a point. Adding to a closed loop re-opens it.
    pub fn add_route_point(&mut self, point: RoutePoint) {
        if self.loop_closed {
            tracing::debug!("Adding a point re-opens the loop");
            self.loop_closed = false;
        }
        self.points.push(point);
        self.recompute_segments();
        tracing::debug!("Added route point #{}", self.points.len() - 1);
    }

    /// Replace the point at `index`. Out-of-range indices are ignored.
    pub fn move_route_point(&mut self, index: usize, new_pos: RoutePoint) {
        let Some(slot) = self.points.get_mut(index) else {
            tracing::debug!("Ignoring move of stale index {}", index);
            return;
        };
        *slot = new_pos;
        self.recompute_segments();
    }

    /// Remove the point at `index`. Out-of-range indices are ignored.
    pub fn delete_point(&mut self, index: usize) {
        if index >= self.points.len() {
            tracing::debug!("Ignoring delete of stale index {}", index);
            return;
        }
        self.points.remove(index);

        self.editing_index = match self.editing_index {
            Some(i) if i == index => None,
            Some(i) if i > index => Some(i - 1),
            other => other,
        };

        self.reopen_if_too_small();
        self.recompute_segments();
        tracing::debug!("Deleted route point #{}", index);
    }

    /// Insert `point` between the adjacent indices `index_a` and `index_b`.
    ///
    /// The pair must satisfy `index_b == index_a + 1` and both must be valid;
    /// anything else is a stale request and is ignored.
    pub fn add_point_between(&mut self, index_a: usize, index_b: usize, point: RoutePoint) {
        if index_a.checked_add(1) != Some(index_b) || index_b >= self.points.len() {
            tracing::debug!(
                "Ignoring insert between non-adjacent or stale indices ({}, {})",
                index_a,
                index_b
            );
            return;
        }
        self.points.insert(index_b, point);

        if let Some(i) = self.editing_index
            && i >= index_b
        {
            self.editing_index = Some(i + 1);
        }

        self.recompute_segments();
        tracing::debug!("Inserted route point #{}", index_b);
    }

    /// Drop all points and derived data and re-open the loop.
    pub fn clear_route(&mut self) {
        self.points.clear();
        self.segment_distances.clear();
        self.distance_markers.clear();
        self.loop_closed = false;
        self.editing_index = None;
        tracing::debug!("Cleared route");
    }

    /// Replace the whole route.
    ///
    /// Points are taken as-is (no validation or deduplication). A closed loop with fewer
    /// than [`MIN_LOOP_POINTS`] points is clamped to open.
    pub fn load_route(&mut self, points: Vec<RoutePoint>, loop_closed: bool) {
        if loop_closed && points.len() < MIN_LOOP_POINTS {
            tracing::warn!(
                "Loaded route claims to be a loop with only {} points; opening it",
                points.len()
            );
        }
        self.loop_closed = loop_closed && points.len() >= MIN_LOOP_POINTS;
        self.points = points;
        self.editing_index = None;
        self.distance_markers.clear();
        self.recompute_segments();
        tracing::debug!(
            "Loaded route with {} points (loop: {})",
            self.points.len(),
            self.loop_closed
        );
    }

    /// Flip the loop state. Refused silently with fewer than [`MIN_LOOP_POINTS`] points.
    pub fn toggle_loop(&mut self) {
        let n = self.points.len();
        if n < MIN_LOOP_POINTS {
            tracing::debug!("Cannot toggle loop with {} points", n);
            return;
        }

        if self.loop_closed {
            self.loop_closed = false;
            self.segment_distances.pop();
        } else {
            self.loop_closed = true;
            let closing = self
                .distance_fn
                .distance(&self.points[n - 1], &self.points[0]);
            self.segment_distances.push(closing);
        }
        tracing::debug!("Loop closed: {}", self.loop_closed);
    }

    /// Remove the last point, if any.
    pub fn undo_last_point(&mut self) {
        if self.points.pop().is_none() {
            return;
        }
        if let Some(i) = self.editing_index
            && i >= self.points.len()
        {
            self.editing_index = None;
        }
        self.reopen_if_too_small();
        self.recompute_segments();
    }

    /// Apply a map tap according to the current mode.
    pub fn handle_map_tap(&mut self, point: RoutePoint) -> TapOutcome {
        if self.edit_mode_enabled {
            if let Some(index) = self.editing_index {
                self.move_route_point(index, point);
                self.editing_index = None;
                return TapOutcome::Moved(index);
            }
            return TapOutcome::Ignored;
        }

        if self.measure_enabled {
            self.add_route_point(point);
            return TapOutcome::Added(self.points.len() - 1);
        }

        TapOutcome::Ignored
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Cumulative distance from the first point to `points[index]` walking forward.
    ///
    /// Returns 0 for out-of-range indices. The closing segment is never included.
    pub fn calculate_distance_to_point(&self, index: usize) -> f64 {
        if index >= self.points.len() {
            return 0.0;
        }
        self.segment_distances.iter().take(index).sum()
    }

    /// Index of the route point closest to `target`, if it lies within `max_distance_m`.
    pub fn nearest_point(&self, target: &RoutePoint, max_distance_m: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, self.distance_fn.distance(p, target)))
            .filter(|(_, d)| *d <= max_distance_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Regenerate markers at every multiple of the configured interval along the path.
    ///
    /// The path includes the closing segment when looped. Zero-length segments are
    /// skipped. Positions are interpolated linearly on lat/lon within each segment.
    /// At most [`MAX_DISTANCE_MARKERS`] markers are produced; the rest of the path is
    /// left unmarked.
    pub fn generate_distance_markers(&mut self) -> &[RoutePoint] {
        self.distance_markers.clear();
        let n = self.points.len();
        if n < 2 {
            return &self.distance_markers;
        }

        let interval_m = self.distance_interval_km * 1000.0;
        let mut cumulative = 0.0;
        let mut next_marker = interval_m;

        let closing = self.loop_closed.then_some((n - 1, 0));
        let segments = (0..n - 1).map(|i| (i, i + 1)).chain(closing);

        'segments: for (from, to) in segments {
            let start = &self.points[from];
            let end = &self.points[to];
            let seg_len = self.distance_fn.distance(start, end);
            if seg_len <= 0.0 {
                continue;
            }

            while next_marker <= cumulative + seg_len {
                let ratio = (next_marker - cumulative) / seg_len;
                self.distance_markers
                    .push(geodesy::interpolate(start, end, ratio));
                if self.distance_markers.len() >= MAX_DISTANCE_MARKERS {
                    tracing::warn!(
                        "Stopped at {} markers; interval of {} km is too fine for this route",
                        MAX_DISTANCE_MARKERS,
                        self.distance_interval_km
                    );
                    break 'segments;
                }
                let advanced = next_marker + interval_m;
                if advanced <= next_marker {
                    break 'segments;
                }
                next_marker = advanced;
            }
            cumulative += seg_len;
        }

        tracing::debug!(
            "Generated {} distance markers every {} km",
            self.distance_markers.len(),
            self.distance_interval_km
        );
        &self.distance_markers
    }

    /// Rendering size for route point markers.
    ///
    /// Grows logarithmically with the average spacing between consecutive points (closing
    /// segment excluded) and is clamped to a fixed range. Routes with 0 or 1 points get
    /// [`DEFAULT_POINT_SIZE`].
    pub fn calculate_dynamic_point_size(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return DEFAULT_POINT_SIZE;
        }

        let open_total: f64 = self.segment_distances.iter().take(n - 1).sum();
        let average = open_total / (n - 1) as f64;
        if average <= POINT_SIZE_REFERENCE_SPACING_M {
            return MIN_POINT_SIZE;
        }

        let size = MIN_POINT_SIZE
            + POINT_SIZE_PER_DECADE * (average / POINT_SIZE_REFERENCE_SPACING_M).log10();
        size.clamp(MIN_POINT_SIZE, MAX_POINT_SIZE)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Capture `(points, loop_closed)` for undo history or persistence
    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            points: self.points.clone(),
            loop_closed: self.loop_closed,
        }
    }

    /// Restore a snapshot; equivalent to [`Self::load_route`]
    pub fn restore(&mut self, snapshot: &RouteSnapshot) {
        self.load_route(snapshot.points.clone(), snapshot.loop_closed);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn reopen_if_too_small(&mut self) {
        if self.loop_closed && self.points.len() < MIN_LOOP_POINTS {
            tracing::debug!("Route dropped below {} points; opening loop", MIN_LOOP_POINTS);
            self.loop_closed = false;
        }
    }

    fn recompute_segments(&mut self) {
        self.segment_distances.clear();
        if self.points.len() < 2 {
            return;
        }

        let distance_fn = &self.distance_fn;
        self.segment_distances.extend(
            self.points
                .windows(2)
                .map(|pair| distance_fn.distance(&pair[0], &pair[1])),
        );

        if self.loop_closed
            && let (Some(last), Some(first)) = (self.points.last(), self.points.first())
        {
            self.segment_distances
                .push(distance_fn.distance(last, first));
        }
    }
}
