//! Geometry helpers for route matching.
//!
//! Distances use the spherical law of cosines and are truncated to whole
//! meters; every threshold comparison in the crate is made against these
//! truncated values. Projections onto segments treat degrees as planar
//! coordinates, which is accurate enough for route segments that are tens
//! of meters long.

use crate::models::{BoundingBox, Point};

/// Equatorial earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Distance between two points in whole meters.
///
/// The result is truncated toward zero, never rounded.
pub fn distance(a: &Point, b: &Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let x = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (b.lng - a.lng).to_radians().cos();

    // The lower clamp only matters for antipodal points, where rounding can
    // push x just below -1 and acos would return NaN.
    (EARTH_RADIUS_M * x.clamp(-1.0, 1.0).acos()).trunc()
}

/// Closest point on the segment `seg_start`..`seg_end` to `point`.
///
/// The projection parameter is clamped to `[0, 1]`, so the result always
/// lies on the closed segment. A zero-length segment returns its start.
pub fn closest_on_line(seg_start: &Point, seg_end: &Point, point: &Point) -> Point {
    let x_delta = seg_end.lat - seg_start.lat;
    let y_delta = seg_end.lng - seg_start.lng;

    if x_delta == 0.0 && y_delta == 0.0 {
        return *seg_start;
    }

    let u = ((point.lat - seg_start.lat) * x_delta + (point.lng - seg_start.lng) * y_delta)
        / (x_delta * x_delta + y_delta * y_delta);

    if u < 0.0 {
        *seg_start
    } else if u > 1.0 {
        *seg_end
    } else {
        Point::new(seg_start.lat + u * x_delta, seg_start.lng + u * y_delta)
    }
}

/// Bounding box of a path, or `None` for an empty path.
pub fn bounding_box(path: &[Point]) -> Option<BoundingBox> {
    let first = path.first()?;
    let mut ne = *first;
    let mut sw = *first;

    for point in &path[1..] {
        ne.lat = ne.lat.max(point.lat);
        ne.lng = ne.lng.max(point.lng);
        sw.lat = sw.lat.min(point.lat);
        sw.lng = sw.lng.min(point.lng);
    }

    Some(BoundingBox { ne, sw })
}

/// Sum of segment distances along a path, in meters.
pub fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}

/// Calculate bearing from `from` to `to` in radians.
/// Returns bearing in radians, 0 = north, π/2 = east.
pub fn bearing(from: &Point, to: &Point) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lng - from.lng).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y)
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `origin` - Starting position
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
pub fn offset_by_bearing(origin: &Point, distance_m: f64, bearing_rad: f64) -> Point {
    if distance_m.abs() <= f64::EPSILON {
        return *origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lng.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    Point::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Point at `fraction` of the way from `a` to `b`, interpolated in degrees.
pub fn interpolate(a: &Point, b: &Point, fraction: f64) -> Point {
    let t = fraction.clamp(0.0, 1.0);
    Point::new(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
}
