pub mod encoding;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod models;
pub mod navigation;
pub mod route;
pub mod routing;
pub mod rules;

#[cfg(test)]
mod testing;

pub use encoding::{decode_polyline, PathPayload};
pub use error::{NavigationError, RouteError};
pub use geofence::{GeofenceDelta, GeofenceEvent, GeofenceRegistry, GeofenceRequest};
pub use models::{
    BoundingBox, Direction, Leg, NearestMatch, Point, PositionFix, RouteSummary,
};
pub use navigation::{
    Anchor, NavigationEngine, NavigationInfo, NavigationState, Notification, NotificationSink,
    RouteDigest, RouteProgress, TrackingState,
};
pub use route::{Route, RoutePayload};
pub use routing::{ReroutePolicy, RerouteRequest};
pub use rules::{NavigationRules, SearchWindow};
