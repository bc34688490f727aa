//! Data models shared by the route model, the geofence registry and the
//! navigation engine.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ========== POINTS ==========

/// A latitude/longitude pair in degrees.
///
/// Deserializes from either `[lat, lng]` or `{"lat": .., "lng": ..}` and
/// always serializes as `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PointRepr", into = "[f64; 2]")]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has finite, in-range coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair([f64; 2]),
    Object {
        lat: f64,
        #[serde(alias = "lon")]
        lng: f64,
    },
}

impl From<PointRepr> for Point {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Pair([lat, lng]) => Point::new(lat, lng),
            PointRepr::Object { lat, lng } => Point::new(lat, lng),
        }
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.lat, point.lng]
    }
}

impl From<[f64; 2]> for Point {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Point::new(lat, lng)
    }
}

/// Axis-aligned extent of a path: `ne` holds the maximum lat/lng and `sw`
/// the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub ne: Point,
    pub sw: Point,
}

impl BoundingBox {
    pub fn contains(&self, point: &Point) -> bool {
        point.lat >= self.sw.lat
            && point.lat <= self.ne.lat
            && point.lng >= self.sw.lng
            && point.lng <= self.ne.lng
    }
}

// ========== POSITION FIXES ==========

/// One position report from the device.
///
/// On the wire the timestamp is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub point: Point,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Reported horizontal accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl PositionFix {
    pub fn new(point: Point, timestamp: DateTime<Utc>) -> Self {
        Self {
            point,
            timestamp,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy = Some(accuracy_m);
        self
    }
}

// ========== ROUTE STRUCTURE ==========

/// One instructed segment of travel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Direction {
    /// Polyline of the direction, at least two points
    pub path: Vec<Point>,
    /// Distance in meters as reported by the routing provider
    pub distance: f64,
    /// Duration in seconds as reported by the routing provider
    pub duration: f64,
    pub leg_index: usize,
    pub direction_index_in_leg: usize,
    /// Opaque turn metadata (instruction text, turn type, street, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Direction {
    pub fn first_point(&self) -> Option<Point> {
        self.path.first().copied()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.path.last().copied()
    }
}

/// A run of directions between two waypoints.
///
/// The directions themselves live in the route's flattened sequence; a leg
/// records the contiguous global index range it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leg {
    pub index: usize,
    pub start: Option<Point>,
    pub end: Option<Point>,
    pub distance: f64,
    pub duration: f64,
    pub first_direction: usize,
    pub direction_count: usize,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Leg {
    /// Global direction indices covered by this leg.
    pub fn direction_range(&self) -> Range<usize> {
        self.first_direction..self.first_direction + self.direction_count
    }
}

/// Aggregate information about a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    /// Total distance in meters
    pub distance: f64,
    /// Total duration in seconds
    pub duration: f64,
    pub bounding_box: Option<BoundingBox>,
    pub start: Option<Point>,
    pub end: Option<Point>,
    /// Concatenated path of every direction
    pub path: Vec<Point>,
    /// Simplified path for display, when the provider supplied one
    pub overview_path: Vec<Point>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

// ========== SEARCH RESULTS ==========

/// The closest point of a route to a position, found by a windowed search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestMatch {
    /// Projection of the position onto the route
    pub point: Point,
    /// Distance in whole meters from the position to `point`
    pub distance_m: f64,
    /// Global index of the matched direction
    pub direction_index: usize,
    pub leg_index: usize,
    pub direction_index_in_leg: usize,
    /// Path index of the segment start the match falls on
    pub prev_path_index: usize,
    /// Path index of the segment end the match falls on
    pub next_path_index: usize,
}
