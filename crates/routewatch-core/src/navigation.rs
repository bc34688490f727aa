//! Navigation engine: per-fix route matching, on/off-route hysteresis,
//! leg tracking and geofence notifications.
//!
//! The engine is passive. A caller feeds it one fix at a time through
//! [`NavigationEngine::process_fix`]; everything the engine has to say is
//! pushed into its [`NotificationSink`] before that call returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::error::NavigationError;
use crate::geo;
use crate::geofence::{GeofenceEvent, GeofenceRegistry, GeofenceRequest};
use crate::models::{BoundingBox, Direction, NearestMatch, Point, PositionFix};
use crate::route::Route;
use crate::rules::NavigationRules;

// ========== STATE ==========

/// Coarse tracking state, derived from the engine's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Not started, or stopped
    Disengaged,
    OnRoute,
    OffRoute,
}

/// Last known-good position on the route, used to bound the next search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub direction_index: usize,
    /// End vertex of the last matched segment
    pub path_index: usize,
}

/// Mutable bookkeeping of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    /// `None` until the first accepted match after a reset
    pub anchor: Option<Anchor>,
    pub current_leg: usize,
    /// Consecutive fixes that matched nothing within the threshold
    pub off_route_count: u32,
    pub off_route_started_at: Option<DateTime<Utc>>,
    pub off_route_time: Duration,
    /// Engagement time, `None` while disengaged
    pub started_at: Option<DateTime<Utc>>,
    /// Fixes processed against the current route
    pub fixes_processed: u64,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            anchor: None,
            current_leg: 0,
            off_route_count: 0,
            off_route_started_at: None,
            off_route_time: Duration::zero(),
            started_at: None,
            fixes_processed: 0,
        }
    }
}

// ========== SNAPSHOTS ==========

/// Progress along the route at the matched point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteProgress {
    /// Meters to the end of the current direction
    pub distance_to_next_direction_m: f64,
    /// Meters to the destination
    pub distance_remaining_m: f64,
    /// Estimated seconds to the destination
    pub duration_remaining_s: f64,
    /// Share of the route distance already covered, 0..=1
    pub completed_ratio: f64,
    /// Within the on-route threshold of the destination on the final direction
    pub arrived: bool,
}

/// Per-fix snapshot of the match result.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationInfo {
    /// Best match found, accepted or not
    pub nearest: Option<NearestMatch>,
    pub raw: PositionFix,
    #[serde(serialize_with = "serialize_route_digest")]
    pub route: Arc<Route>,
    pub on_route: bool,
    pub leg_index: usize,
    /// Present only when on-route
    pub progress: Option<RouteProgress>,
}

impl NavigationInfo {
    pub fn current_direction(&self) -> Option<&Direction> {
        self.nearest
            .as_ref()
            .and_then(|nearest| self.route.direction(nearest.direction_index))
    }
}

/// Compact description of a route for notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDigest {
    pub distance: f64,
    pub duration: f64,
    pub bounding_box: Option<BoundingBox>,
    pub start: Option<Point>,
    pub end: Option<Point>,
    pub leg_count: usize,
    pub direction_count: usize,
}

impl From<&Route> for RouteDigest {
    fn from(route: &Route) -> Self {
        let summary = route.summary();
        Self {
            distance: summary.distance,
            duration: summary.duration,
            bounding_box: summary.bounding_box,
            start: route.start(),
            end: route.destination(),
            leg_count: route.leg_count(),
            direction_count: route.direction_count(),
        }
    }
}

fn serialize_route_digest<S: Serializer>(route: &Arc<Route>, serializer: S) -> Result<S::Ok, S::Error> {
    RouteDigest::from(route.as_ref()).serialize(serializer)
}

// ========== NOTIFICATIONS ==========

/// Everything the engine reports.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Notification {
    Start {
        start_time: DateTime<Utc>,
        #[serde(serialize_with = "serialize_route_digest")]
        route: Arc<Route>,
    },
    Stop {
        #[serde(serialize_with = "serialize_route_digest")]
        route: Arc<Route>,
    },
    OnRoute {
        nav_info: NavigationInfo,
    },
    OffRoute {
        #[serde(serialize_with = "serialize_route_digest")]
        route: Arc<Route>,
        fix: PositionFix,
        leg_index: usize,
        consecutive_misses: u32,
        off_route_started_at: DateTime<Utc>,
        off_route_secs: f64,
    },
    LegChanged {
        leg_index: usize,
        nav_info: NavigationInfo,
        #[serde(serialize_with = "serialize_route_digest")]
        route: Arc<Route>,
    },
    OnEvents {
        events: BTreeMap<String, GeofenceEvent>,
    },
    OffEvents {
        events: BTreeMap<String, GeofenceEvent>,
    },
}

impl Notification {
    /// Wire name of the notification.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Start { .. } => "start",
            Notification::Stop { .. } => "stop",
            Notification::OnRoute { .. } => "onroute",
            Notification::OffRoute { .. } => "offroute",
            Notification::LegChanged { .. } => "legchanged",
            Notification::OnEvents { .. } => "onevents",
            Notification::OffEvents { .. } => "offevents",
        }
    }
}

/// Receiver of engine notifications.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

// ========== ENGINE ==========

/// Stateful route tracker.
pub struct NavigationEngine<S> {
    rules: NavigationRules,
    sink: S,
    route: Option<Arc<Route>>,
    geofences: GeofenceRegistry,
    state: NavigationState,
}

impl<S: NotificationSink> NavigationEngine<S> {
    pub fn new(rules: NavigationRules, sink: S) -> Self {
        let geofences = GeofenceRegistry::new(rules.default_geofence_radius_m);
        Self {
            rules,
            sink,
            route: None,
            geofences,
            state: NavigationState::default(),
        }
    }

    pub fn rules(&self) -> &NavigationRules {
        &self.rules
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn geofences(&self) -> &GeofenceRegistry {
        &self.geofences
    }

    pub fn is_started(&self) -> bool {
        self.state.started_at.is_some()
    }

    pub fn tracking_state(&self) -> TrackingState {
        if !self.is_started() {
            TrackingState::Disengaged
        } else if self.state.off_route_count > 0 {
            TrackingState::OffRoute
        } else {
            TrackingState::OnRoute
        }
    }

    /// Install a route and reset all matching state.
    ///
    /// Geofence registrations are kept; only their active flags clear.
    /// Engagement is unaffected, so a started engine keeps tracking
    /// against the new route.
    pub fn set_route(&mut self, route: impl Into<Arc<Route>>) {
        let route = route.into();
        tracing::info!(
            "Route installed: {} leg(s), {} direction(s), {:.0}m",
            route.leg_count(),
            route.direction_count(),
            route.summary().distance
        );
        self.route = Some(route);
        self.reset();
    }

    /// Swap in a route fetched after going off-route. Same reset as
    /// [`set_route`](Self::set_route); returns the replaced route.
    pub fn replace_route(&mut self, route: impl Into<Arc<Route>>) -> Option<Arc<Route>> {
        let previous = self.route.take();
        let misses = self.state.off_route_count;
        self.set_route(route);
        tracing::info!("Route replaced after {} off-route fix(es)", misses);
        previous
    }

    fn reset(&mut self) {
        self.state = NavigationState {
            started_at: self.state.started_at,
            ..NavigationState::default()
        };
        self.geofences.reset_active();
    }

    /// Begin tracking.
    ///
    /// Emits `start`, then processes `last_fix` (the most recent known
    /// position) if there is one. Starting an engine that is already
    /// started does nothing.
    pub fn start(
        &mut self,
        at: DateTime<Utc>,
        last_fix: Option<&PositionFix>,
    ) -> Result<Option<NavigationInfo>, NavigationError> {
        let route = self.route.clone().ok_or(NavigationError::NoRoute)?;
        if self.is_started() {
            tracing::debug!("Navigation already started");
            return Ok(None);
        }

        self.state.started_at = Some(at);
        self.state.current_leg = 0;
        tracing::info!("Navigation started at {}", at);
        self.sink.notify(Notification::Start {
            start_time: at,
            route,
        });

        last_fix.map(|fix| self.process_fix(fix)).transpose()
    }

    /// Stop tracking. Matching state and geofences are left as they are.
    ///
    /// Returns `false` if the engine was not started; in that case no
    /// `stop` notification is emitted.
    pub fn stop(&mut self) -> bool {
        if self.state.started_at.take().is_none() {
            return false;
        }

        tracing::info!(
            "Navigation stopped after {} fix(es)",
            self.state.fixes_processed
        );
        if let Some(route) = &self.route {
            self.sink.notify(Notification::Stop {
                route: Arc::clone(route),
            });
        }
        true
    }

    pub fn add_geofence(&mut self, request: GeofenceRequest) -> Option<String> {
        self.geofences.add(request)
    }

    pub fn remove_geofence(&mut self, id: &str) -> Option<GeofenceEvent> {
        self.geofences.remove(id)
    }

    /// Match one fix against the route and emit the resulting notifications.
    pub fn process_fix(&mut self, fix: &PositionFix) -> Result<NavigationInfo, NavigationError> {
        if !self.is_started() {
            return Err(NavigationError::NotStarted);
        }
        let route = self.route.clone().ok_or(NavigationError::NoRoute)?;
        self.state.fixes_processed += 1;

        let (nearest, accepted) = self.search(&route, &fix.point);
        let info = match nearest.filter(|_| accepted) {
            Some(matched) => self.on_route(route, fix, matched),
            None => self.off_route(route, fix, nearest),
        };

        self.evaluate_geofences(&fix.point);
        Ok(info)
    }

    /// Graduated search. Returns the match of the first acceptable window,
    /// or the last match found when none was acceptable.
    fn search(&self, route: &Route, point: &Point) -> (Option<NearestMatch>, bool) {
        let Some(anchor) = self.state.anchor else {
            let nearest = route.nearest_to(point, 0, 0, None);
            let accepted = nearest.is_some_and(|m| self.rules.accepts(m.distance_m));
            return (nearest, accepted);
        };

        let mut last = None;
        for (step, window) in self.rules.search_windows.iter().enumerate() {
            let (direction, path, max) = window.bounds(anchor.direction_index, anchor.path_index);
            let Some(nearest) = route.nearest_to(point, direction, path, max) else {
                continue;
            };
            if self.rules.accepts(nearest.distance_m) {
                tracing::debug!(
                    "Matched in window {} at direction {} ({}m)",
                    step,
                    nearest.direction_index,
                    nearest.distance_m
                );
                return (Some(nearest), true);
            }
            last = Some(nearest);
        }

        (last, false)
    }

    fn on_route(&mut self, route: Arc<Route>, fix: &PositionFix, matched: NearestMatch) -> NavigationInfo {
        self.state.off_route_count = 0;
        self.state.anchor = Some(Anchor {
            direction_index: matched.direction_index,
            path_index: matched.next_path_index,
        });

        let leg_changed = matched.leg_index != self.state.current_leg;
        if leg_changed {
            tracing::info!("Leg changed: {} -> {}", self.state.current_leg, matched.leg_index);
            self.state.current_leg = matched.leg_index;
        }

        let info = NavigationInfo {
            nearest: Some(matched),
            raw: fix.clone(),
            progress: progress(&route, &matched, self.rules.on_route_threshold_m),
            route: Arc::clone(&route),
            on_route: true,
            leg_index: self.state.current_leg,
        };

        if leg_changed {
            self.sink.notify(Notification::LegChanged {
                leg_index: self.state.current_leg,
                nav_info: info.clone(),
                route,
            });
        }
        self.sink.notify(Notification::OnRoute {
            nav_info: info.clone(),
        });
        info
    }

    fn off_route(
        &mut self,
        route: Arc<Route>,
        fix: &PositionFix,
        nearest: Option<NearestMatch>,
    ) -> NavigationInfo {
        let now = fix.timestamp;
        let started_at = match self.state.off_route_started_at {
            Some(started_at) if self.state.off_route_count > 0 => {
                self.state.off_route_time = now - started_at;
                started_at
            }
            _ => {
                self.state.off_route_started_at = Some(now);
                self.state.off_route_time = Duration::zero();
                now
            }
        };
        self.state.off_route_count += 1;

        tracing::debug!(
            "Off route: miss {} ({}m from route)",
            self.state.off_route_count,
            nearest.map_or(f64::INFINITY, |m| m.distance_m)
        );

        self.sink.notify(Notification::OffRoute {
            route: Arc::clone(&route),
            fix: fix.clone(),
            leg_index: self.state.current_leg,
            consecutive_misses: self.state.off_route_count,
            off_route_started_at: started_at,
            off_route_secs: self.state.off_route_time.num_milliseconds() as f64 / 1000.0,
        });

        NavigationInfo {
            nearest,
            raw: fix.clone(),
            route,
            on_route: false,
            leg_index: self.state.current_leg,
            progress: None,
        }
    }

    fn evaluate_geofences(&mut self, point: &Point) {
        let delta = self.geofences.evaluate(point);

        if !delta.exited.is_empty() {
            self.sink.notify(Notification::OffEvents {
                events: delta.exited,
            });
        }
        if !delta.entered.is_empty() {
            self.sink.notify(Notification::OnEvents {
                events: delta.entered,
            });
        }
    }
}

/// Distance and time left from the matched point.
fn progress(route: &Route, matched: &NearestMatch, threshold_m: f64) -> Option<RouteProgress> {
    let direction = route.direction(matched.direction_index)?;
    let path = &direction.path;

    let to_next_vertex = path
        .get(matched.next_path_index)
        .map_or(0.0, |next| geo::distance(&matched.point, next));
    let rest_of_direction = path
        .get(matched.next_path_index..)
        .map_or(0.0, geo::path_length);
    let to_direction_end = to_next_vertex + rest_of_direction;

    let later = route
        .directions()
        .get(matched.direction_index + 1..)
        .unwrap_or(&[]);
    let distance_remaining = to_direction_end + later.iter().map(|d| d.distance).sum::<f64>();

    let direction_share_left = if direction.distance > 0.0 {
        (to_direction_end / direction.distance).min(1.0)
    } else {
        0.0
    };
    let duration_remaining =
        direction.duration * direction_share_left + later.iter().map(|d| d.duration).sum::<f64>();

    let total = route.summary().distance;
    let completed_ratio = if total > 0.0 {
        (1.0 - distance_remaining / total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(RouteProgress {
        distance_to_next_direction_m: to_direction_end,
        distance_remaining_m: distance_remaining,
        duration_remaining_s: duration_remaining,
        completed_ratio,
        arrived: later.is_empty() && distance_remaining < threshold_m,
    })
}
