//! Matching rules and thresholds for the navigation engine.

use serde::{Deserialize, Serialize};

/// Configuration for route matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationRules {
    /// A match is on-route when its distance is strictly below this (meters)
    pub on_route_threshold_m: f64,
    /// Anchored search windows, tried in order until one yields an
    /// acceptable match
    pub search_windows: Vec<SearchWindow>,
    /// Radius applied to geofences registered without one (meters)
    pub default_geofence_radius_m: f64,
}

impl Default for NavigationRules {
    fn default() -> Self {
        Self {
            on_route_threshold_m: 30.0,
            search_windows: vec![
                SearchWindow::Anchored { max_directions: 2 },
                SearchWindow::Rewind { back: 2, max_directions: 5 },
                SearchWindow::Rewind { back: 4, max_directions: 10 },
                SearchWindow::Full,
            ],
            default_geofence_radius_m: 100.0,
        }
    }
}

impl NavigationRules {
    pub fn accepts(&self, distance_m: f64) -> bool {
        distance_m < self.on_route_threshold_m
    }
}

/// One step of the graduated search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchWindow {
    /// Start at the anchor's direction, on the segment that ends at the
    /// anchor's path index, scanning up to `max_directions`.
    Anchored { max_directions: usize },
    /// Start `back` directions before the anchor (clamped at 0), at path
    /// index 0, scanning up to `max_directions`.
    Rewind { back: usize, max_directions: usize },
    /// Scan the whole route from the beginning.
    Full,
}

impl SearchWindow {
    /// Resolve to `(start_direction, start_path, max_directions)` for an
    /// anchor at `(direction, path)`.
    ///
    /// The anchored window deliberately starts one vertex before the
    /// anchor's path index rather than at it. The anchor holds the end
    /// vertex of the last matched segment, and starting at that vertex
    /// would leave the segment the device was last matched on out of the
    /// window, sending steady progress along one segment to the rewind
    /// windows.
    pub fn bounds(&self, direction: usize, path: usize) -> (usize, usize, Option<usize>) {
        match *self {
            SearchWindow::Anchored { max_directions } => {
                (direction, path.saturating_sub(1), Some(max_directions))
            }
            SearchWindow::Rewind {
                back,
                max_directions,
            } => (direction.saturating_sub(back), 0, Some(max_directions)),
            SearchWindow::Full => (0, 0, None),
        }
    }
}
