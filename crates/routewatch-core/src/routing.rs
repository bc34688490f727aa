//! Reroute requests and the policy deciding when to issue them.
//!
//! The engine only reports that the device left the route; asking a
//! routing provider for a new one is up to the consumer of `offroute`
//! notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Point, PositionFix};
use crate::route::Route;

/// A request for a fresh route from the current position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteRequest {
    pub origin: Point,
    pub destination: Point,
    /// Leg end points still ahead, in order, excluding the destination
    #[serde(default)]
    pub waypoints: Vec<Point>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub requested_at: DateTime<Utc>,
}

impl RerouteRequest {
    /// Build a request anchored at `fix`, heading for the destination of
    /// `route` through the ends of every leg from `current_leg` on.
    ///
    /// Returns `None` for a route without a destination.
    pub fn for_route(route: &Route, fix: &PositionFix, current_leg: usize) -> Option<Self> {
        let destination = route.destination()?;
        let last_leg = route.leg_count().saturating_sub(1);
        let waypoints = route
            .legs()
            .iter()
            .skip(current_leg)
            .take(last_leg.saturating_sub(current_leg))
            .filter_map(|leg| leg.end)
            .collect();

        Some(Self {
            origin: fix.point,
            destination,
            waypoints,
            requested_at: fix.timestamp,
        })
    }
}

/// When an off-route excursion warrants a new route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReroutePolicy {
    /// Reroute after this many consecutive off-route fixes
    pub min_consecutive_misses: u32,
    /// Or after being off-route this long (seconds)
    pub min_off_route_secs: f64,
}

impl Default for ReroutePolicy {
    fn default() -> Self {
        Self {
            min_consecutive_misses: 3,
            min_off_route_secs: 10.0,
        }
    }
}

impl ReroutePolicy {
    /// Either condition is enough.
    pub fn should_reroute(&self, consecutive_misses: u32, off_route_secs: f64) -> bool {
        consecutive_misses >= self.min_consecutive_misses
            || off_route_secs >= self.min_off_route_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{straight_route_payload, vertex};

    fn fix_at(point: Point) -> PositionFix {
        PositionFix::new(point, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn request_targets_remaining_leg_ends() {
        // Three legs of one 20m direction each: ends at vertices 1, 2, 3.
        let route = Route::from_value(straight_route_payload(&[1, 1, 1], 2, 20.0)).unwrap();
        let fix = fix_at(Point::new(48.2, 11.6));

        let from_start = RerouteRequest::for_route(&route, &fix, 0).unwrap();
        assert_eq!(from_start.origin, fix.point);
        assert_eq!(from_start.destination, vertex(3, 20.0));
        assert_eq!(from_start.waypoints, vec![vertex(1, 20.0), vertex(2, 20.0)]);
        assert_eq!(from_start.requested_at, fix.timestamp);

        let on_second = RerouteRequest::for_route(&route, &fix, 1).unwrap();
        assert_eq!(on_second.waypoints, vec![vertex(2, 20.0)]);

        let on_last = RerouteRequest::for_route(&route, &fix, 2).unwrap();
        assert!(on_last.waypoints.is_empty());
    }

    #[test]
    fn policy_triggers_on_either_condition() {
        let policy = ReroutePolicy::default();
        assert!(!policy.should_reroute(1, 0.0));
        assert!(!policy.should_reroute(2, 9.9));
        assert!(policy.should_reroute(3, 0.0));
        assert!(policy.should_reroute(1, 10.0));
    }
}
