//! Route model: normalization of provider payloads and the windowed
//! nearest-point search.
//!
//! Every direction of every leg is stored in one flattened sequence whose
//! global index (leg order, then direction order within the leg) is the
//! coordinate system the search windows operate in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::encoding::PathPayload;
use crate::error::RouteError;
use crate::geo;
use crate::models::{BoundingBox, Direction, Leg, NearestMatch, Point, RouteSummary};

// ========== PAYLOADS ==========

/// A route description as supplied by a routing provider.
///
/// Either `legs` (nested) or `directions` (flat, one implicit leg) is
/// expected; a bare top-level `path` is accepted as a single direction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutePayload {
    #[serde(default)]
    pub legs: Option<Vec<LegPayload>>,
    #[serde(default)]
    pub directions: Option<Vec<DirectionPayload>>,
    #[serde(default)]
    pub path: Option<PathPayload>,
    #[serde(default)]
    pub summary: Option<SummaryPayload>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegPayload {
    #[serde(default)]
    pub directions: Vec<DirectionPayload>,
    #[serde(default)]
    pub start: Option<Point>,
    #[serde(default)]
    pub end: Option<Point>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl LegPayload {
    fn implicit(directions: Vec<DirectionPayload>) -> Self {
        Self {
            directions,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectionPayload {
    #[serde(default)]
    pub path: PathPayload,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryPayload {
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, alias = "boundingBox")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, alias = "overviewPath")]
    pub overview_path: Option<PathPayload>,
    #[serde(default)]
    pub path: Option<PathPayload>,
    #[serde(default)]
    pub start: Option<Point>,
    #[serde(default)]
    pub end: Option<Point>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

// ========== ROUTE ==========

/// A normalized, immutable route.
///
/// Routes are replaced wholesale on reroute, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    legs: Vec<Leg>,
    directions: Vec<Direction>,
    summary: RouteSummary,
}

impl Route {
    /// Parse and normalize a JSON route payload.
    pub fn from_json(json: &str) -> Result<Self, RouteError> {
        let payload: RoutePayload = serde_json::from_str(json)?;
        Self::normalize(payload)
    }

    /// Normalize an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, RouteError> {
        let payload: RoutePayload = serde_json::from_value(value)?;
        Self::normalize(payload)
    }

    /// Normalize a payload into legs and a flattened direction sequence.
    ///
    /// Fails if no direction can be derived, if a leg is empty, or if a
    /// direction's path has fewer than two points.
    pub fn normalize(payload: RoutePayload) -> Result<Self, RouteError> {
        let RoutePayload {
            legs,
            directions,
            path,
            summary,
            distance,
            duration,
        } = payload;
        let summary = summary.unwrap_or_default();
        let total_distance = summary.distance.or(distance);
        let total_duration = summary.duration.or(duration);

        let leg_payloads = match (legs, directions, path) {
            (Some(legs), _, _) if !legs.is_empty() => legs,
            (_, Some(directions), _) if !directions.is_empty() => {
                vec![LegPayload::implicit(directions)]
            }
            (_, _, Some(path)) => vec![LegPayload::implicit(vec![DirectionPayload {
                path,
                distance: total_distance,
                duration: total_duration,
                metadata: Map::new(),
            }])],
            _ => return Err(RouteError::NoDirections),
        };

        let mut legs = Vec::with_capacity(leg_payloads.len());
        let mut directions = Vec::new();

        for (leg_index, leg) in leg_payloads.into_iter().enumerate() {
            if leg.directions.is_empty() {
                return Err(RouteError::EmptyLeg { leg: leg_index });
            }

            let first_direction = directions.len();
            for (direction_index_in_leg, direction) in leg.directions.into_iter().enumerate() {
                let path = direction.path.into_points()?;
                if path.len() < 2 {
                    return Err(RouteError::ShortPath {
                        leg: leg_index,
                        direction: direction_index_in_leg,
                        points: path.len(),
                    });
                }
                let distance = direction
                    .distance
                    .unwrap_or_else(|| geo::path_length(&path));

                directions.push(Direction {
                    path,
                    distance,
                    duration: direction.duration.unwrap_or(0.0),
                    leg_index,
                    direction_index_in_leg,
                    metadata: direction.metadata,
                });
            }

            let leg_directions = &directions[first_direction..];
            legs.push(Leg {
                index: leg_index,
                start: leg
                    .start
                    .or_else(|| leg_directions.first().and_then(Direction::first_point)),
                end: leg
                    .end
                    .or_else(|| leg_directions.last().and_then(Direction::last_point)),
                distance: leg
                    .distance
                    .unwrap_or_else(|| leg_directions.iter().map(|d| d.distance).sum()),
                duration: leg
                    .duration
                    .unwrap_or_else(|| leg_directions.iter().map(|d| d.duration).sum()),
                first_direction,
                direction_count: leg_directions.len(),
                metadata: leg.metadata,
            });
        }

        let full_path: Vec<Point> = match summary.path {
            Some(path) => path.into_points()?,
            None => Vec::new(),
        };
        let full_path = if full_path.is_empty() {
            directions
                .iter()
                .flat_map(|d| d.path.iter().copied())
                .collect()
        } else {
            full_path
        };
        let overview_path = match summary.overview_path {
            Some(path) => path.into_points()?,
            None => Vec::new(),
        };

        let summary = RouteSummary {
            distance: total_distance.unwrap_or_else(|| legs.iter().map(|l| l.distance).sum()),
            duration: total_duration.unwrap_or_else(|| legs.iter().map(|l| l.duration).sum()),
            bounding_box: summary
                .bounding_box
                .or_else(|| geo::bounding_box(&full_path)),
            start: summary
                .start
                .or_else(|| directions.first().and_then(Direction::first_point)),
            end: summary
                .end
                .or_else(|| directions.last().and_then(Direction::last_point)),
            path: full_path,
            overview_path,
            metadata: summary.metadata,
        };

        tracing::debug!(
            "Normalized route: {} leg(s), {} direction(s), {:.0}m",
            legs.len(),
            directions.len(),
            summary.distance
        );

        Ok(Self {
            legs,
            directions,
            summary,
        })
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn leg(&self, index: usize) -> Option<&Leg> {
        self.legs.get(index)
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Directions of one leg, in order.
    pub fn leg_directions(&self, leg_index: usize) -> &[Direction] {
        self.legs
            .get(leg_index)
            .map(|leg| &self.directions[leg.direction_range()])
            .unwrap_or(&[])
    }

    /// All directions in global index order.
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn direction(&self, index: usize) -> Option<&Direction> {
        self.directions.get(index)
    }

    pub fn direction_count(&self) -> usize {
        self.directions.len()
    }

    pub fn summary(&self) -> &RouteSummary {
        &self.summary
    }

    /// First point of the first direction.
    pub fn start(&self) -> Option<Point> {
        self.directions.first().and_then(Direction::first_point)
    }

    /// Last point of the last direction.
    pub fn destination(&self) -> Option<Point> {
        self.directions.last().and_then(Direction::last_point)
    }

    /// Find the closest point of the route to `point`.
    ///
    /// Scans forward from direction `start_direction`, beginning at path
    /// index `start_path` in that first direction and at path index 0 in
    /// every later one. With `max_directions` set, at most that many
    /// directions are examined; otherwise the scan runs to the end of the
    /// route. The scan never moves backward.
    ///
    /// A candidate replaces the current best only when it is strictly
    /// closer, so ties keep the earliest match in scan order. Returns
    /// `None` when the window contains no segment.
    pub fn nearest_to(
        &self,
        point: &Point,
        start_direction: usize,
        start_path: usize,
        max_directions: Option<usize>,
    ) -> Option<NearestMatch> {
        let end = match max_directions {
            Some(max) => start_direction.saturating_add(max).min(self.directions.len()),
            None => self.directions.len(),
        };

        let mut nearest: Option<NearestMatch> = None;

        for direction_index in start_direction..end {
            let direction = &self.directions[direction_index];
            let path = &direction.path;
            let path_start = if direction_index == start_direction {
                start_path
            } else {
                0
            };

            for j in path_start..path.len().saturating_sub(1) {
                let candidate = geo::closest_on_line(&path[j], &path[j + 1], point);
                let distance_m = geo::distance(point, &candidate);

                if nearest
                    .as_ref()
                    .is_some_and(|best| distance_m >= best.distance_m)
                {
                    continue;
                }

                nearest = Some(NearestMatch {
                    point: candidate,
                    distance_m,
                    direction_index,
                    leg_index: direction.leg_index,
                    direction_index_in_leg: direction.direction_index_in_leg,
                    prev_path_index: j,
                    next_path_index: j + 1,
                });

                // Nothing later can be strictly closer than an exact hit.
                if distance_m == 0.0 {
                    return nearest;
                }
            }
        }

        nearest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{east_of, straight_route_payload, ORIGIN};
    use serde_json::json;

    #[test]
    fn nested_payload_assigns_leg_and_direction_indices() {
        let route = Route::from_value(straight_route_payload(&[2, 3], 3, 20.0)).unwrap();

        assert_eq!(route.leg_count(), 2);
        assert_eq!(route.direction_count(), 5);
        for (global, direction) in route.directions().iter().enumerate() {
            let expected_leg = usize::from(global >= 2);
            let expected_in_leg = if global >= 2 { global - 2 } else { global };
            assert_eq!(direction.leg_index, expected_leg);
            assert_eq!(direction.direction_index_in_leg, expected_in_leg);
        }
        assert_eq!(route.legs()[1].direction_range(), 2..5);
        assert_eq!(route.leg_directions(1).len(), 3);
        assert!(route.leg_directions(7).is_empty());
    }

    #[test]
    fn flat_payload_becomes_single_leg_in_order() {
        let payload = json!({
            "directions": [
                { "path": [[0.0, 0.0], [0.0, 0.001]], "instruction": "first" },
                { "path": [[0.0, 0.001], [0.0, 0.002]], "instruction": "second" },
                { "path": [[0.0, 0.002], [0.0, 0.003]], "instruction": "third" },
            ]
        });
        let route = Route::from_value(payload).unwrap();

        assert_eq!(route.leg_count(), 1);
        let leg = &route.legs()[0];
        assert_eq!(leg.direction_count, 3);
        let instructions: Vec<&str> = route
            .leg_directions(0)
            .iter()
            .map(|d| d.metadata["instruction"].as_str().unwrap())
            .collect();
        assert_eq!(instructions, ["first", "second", "third"]);
        assert_eq!(leg.start, Some(Point::new(0.0, 0.0)));
        assert_eq!(leg.end, Some(Point::new(0.0, 0.003)));
    }

    #[test]
    fn summary_defaults_are_derived() {
        let payload = json!({
            "directions": [
                { "path": [[48.0, 11.0], [48.001, 11.0]], "distance": 111.0, "duration": 10.0 },
                { "path": [[48.001, 11.0], [48.001, 11.002]], "distance": 148.0, "duration": 15.0 },
            ]
        });
        let route = Route::from_value(payload).unwrap();
        let summary = route.summary();

        assert_eq!(summary.distance, 259.0);
        assert_eq!(summary.duration, 25.0);
        assert_eq!(summary.path.len(), 4);
        let bbox = summary.bounding_box.unwrap();
        assert_eq!(bbox.ne, Point::new(48.001, 11.002));
        assert_eq!(bbox.sw, Point::new(48.0, 11.0));
        assert_eq!(route.start(), Some(Point::new(48.0, 11.0)));
        assert_eq!(route.destination(), Some(Point::new(48.001, 11.002)));
    }

    #[test]
    fn supplied_summary_wins() {
        let payload = json!({
            "directions": [{ "path": [[48.0, 11.0], [48.001, 11.0]] }],
            "summary": {
                "distance": 999.0,
                "duration": 60.0,
                "boundingBox": { "ne": [50.0, 12.0], "sw": [47.0, 10.0] },
                "overviewPath": "_p~iF~ps|U_ulLnnqC",
                "warnings": ["tolls"]
            }
        });
        let route = Route::from_value(payload).unwrap();
        let summary = route.summary();

        assert_eq!(summary.distance, 999.0);
        assert_eq!(summary.duration, 60.0);
        assert_eq!(summary.bounding_box.unwrap().ne, Point::new(50.0, 12.0));
        assert_eq!(summary.overview_path.len(), 2);
        assert_eq!(summary.metadata["warnings"], json!(["tolls"]));
    }

    #[test]
    fn bare_path_becomes_one_direction() {
        let payload = json!({
            "path": [[1.0, 1.0], [1.0, 1.001], [1.0, 1.002]],
            "distance": 222.0,
            "duration": 30.0
        });
        let route = Route::from_value(payload).unwrap();

        assert_eq!(route.leg_count(), 1);
        assert_eq!(route.direction_count(), 1);
        assert_eq!(route.directions()[0].distance, 222.0);
        assert_eq!(route.directions()[0].duration, 30.0);
    }

    #[test]
    fn encoded_direction_paths_are_decoded() {
        let payload = json!({
            "legs": [{ "directions": [{ "path": "_p~iF~ps|U_ulLnnqC_mqNvxq`@" }] }]
        });
        let route = Route::from_value(payload).unwrap();
        assert_eq!(route.directions()[0].path.len(), 3);
        assert!(route.directions()[0].distance > 0.0);
    }

    #[test]
    fn structural_errors_fail_fast() {
        assert!(matches!(
            Route::from_value(json!({ "summary": {} })),
            Err(RouteError::NoDirections)
        ));
        assert!(matches!(
            Route::from_value(json!({ "directions": [] })),
            Err(RouteError::NoDirections)
        ));
        assert!(matches!(
            Route::from_value(json!({ "legs": [{ "directions": [] }] })),
            Err(RouteError::EmptyLeg { leg: 0 })
        ));
        assert!(matches!(
            Route::from_value(json!({ "directions": [{ "path": [[1.0, 1.0]] }] })),
            Err(RouteError::ShortPath { leg: 0, direction: 0, points: 1 })
        ));
        assert!(matches!(
            Route::from_json("{not json"),
            Err(RouteError::Json(_))
        ));
    }

    #[test]
    fn unbounded_search_is_no_worse_than_any_vertex() {
        let route = Route::from_value(straight_route_payload(&[2, 2], 4, 25.0)).unwrap();
        let probes = [
            east_of(&ORIGIN, 10.0, 12.0),
            east_of(&ORIGIN, 95.0, -40.0),
            east_of(&ORIGIN, 310.0, 3.0),
            east_of(&ORIGIN, -50.0, 0.0),
        ];

        for probe in probes {
            let nearest = route.nearest_to(&probe, 0, 0, None).unwrap();
            for direction in route.directions() {
                for vertex in &direction.path {
                    assert!(nearest.distance_m <= geo::distance(&probe, vertex));
                }
            }
        }
    }

    #[test]
    fn match_reports_segment_and_indices() {
        let route = Route::from_value(straight_route_payload(&[2, 2], 3, 20.0)).unwrap();
        // 3 points per direction at 20m spacing: each direction spans 40m.
        let probe = east_of(&ORIGIN, 130.0, 5.0);
        let nearest = route.nearest_to(&probe, 0, 0, None).unwrap();

        assert_eq!(nearest.direction_index, 3);
        assert_eq!(nearest.leg_index, 1);
        assert_eq!(nearest.direction_index_in_leg, 1);
        assert_eq!(nearest.prev_path_index, 0);
        assert_eq!(nearest.next_path_index, 1);
        assert!(nearest.distance_m <= 5.0);
    }

    #[test]
    fn window_bounds_limit_the_scan() {
        let route = Route::from_value(straight_route_payload(&[6], 3, 20.0)).unwrap();
        let far_ahead = east_of(&ORIGIN, 220.0, 0.0);

        let bounded = route.nearest_to(&far_ahead, 0, 0, Some(2)).unwrap();
        assert_eq!(bounded.direction_index, 1);
        assert!(bounded.distance_m > 100.0);

        let unbounded = route.nearest_to(&far_ahead, 0, 0, None).unwrap();
        assert_eq!(unbounded.direction_index, 5);
        assert!(unbounded.distance_m < 2.0);

        // Starting inside a direction skips its earlier segments.
        let at_start = east_of(&ORIGIN, 1.0, 0.0);
        let skipped = route.nearest_to(&at_start, 0, 1, Some(1)).unwrap();
        assert_eq!(skipped.prev_path_index, 1);

        assert!(route.nearest_to(&at_start, 6, 0, None).is_none());
        assert!(route.nearest_to(&at_start, 0, 0, Some(0)).is_none());
    }

    #[test]
    fn ties_keep_the_earliest_match() {
        // Two directions over the same segment: equal distances, first one wins.
        let payload = json!({
            "directions": [
                { "path": [[0.0, 0.0], [0.0, 0.001]] },
                { "path": [[0.0, 0.0], [0.0, 0.001]] },
            ]
        });
        let route = Route::from_value(payload).unwrap();
        let probe = Point::new(0.0002, 0.0005);
        let nearest = route.nearest_to(&probe, 0, 0, None).unwrap();
        assert_eq!(nearest.direction_index, 0);
    }
}
