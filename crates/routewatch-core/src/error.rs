//! Error types for route normalization and engine lifecycle.

use thiserror::Error;

/// Structural problems with a route payload.
///
/// A route that fails normalization is never installed, so the engine
/// cannot operate against a partially defined route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route payload has no directions and no path")]
    NoDirections,

    #[error("leg {leg} has no directions")]
    EmptyLeg { leg: usize },

    #[error("direction {direction} of leg {leg} has {points} path point(s), at least 2 required")]
    ShortPath {
        leg: usize,
        direction: usize,
        points: usize,
    },

    #[error("invalid encoded polyline: {0}")]
    Polyline(String),

    #[error("invalid route payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the navigation engine's entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no route installed")]
    NoRoute,

    #[error("navigation has not been started")]
    NotStarted,
}
