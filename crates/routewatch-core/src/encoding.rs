//! Path encodings accepted in route payloads (decoded points or encoded polylines).

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::models::Point;

/// Coordinate precision of encoded polylines (1e-5 degrees).
pub const POLYLINE_PRECISION: u32 = 5;

/// A direction path as it arrives from a routing provider: either decoded
/// points or a delta-encoded polyline string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathPayload {
    Points(Vec<Point>),
    Encoded(String),
}

impl PathPayload {
    /// Decode into points. Already-decoded paths are returned as-is.
    pub fn into_points(self) -> Result<Vec<Point>, RouteError> {
        match self {
            PathPayload::Points(points) => Ok(points),
            PathPayload::Encoded(encoded) => decode_polyline(&encoded),
        }
    }
}

impl Default for PathPayload {
    fn default() -> Self {
        PathPayload::Points(Vec::new())
    }
}

/// Decode a polyline string into `[lat, lng]` points.
pub fn decode_polyline(encoded: &str) -> Result<Vec<Point>, RouteError> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map_err(|err| RouteError::Polyline(err.to_string()))?;

    // geo coordinates are (x = lng, y = lat)
    Ok(line.coords().map(|c| Point::new(c.y, c.x)).collect())
}
