//! Shared fixtures for unit tests.

use serde_json::{json, Value};

use crate::geo::offset_by_bearing;
use crate::models::Point;

pub const ORIGIN: Point = Point::new(48.137, 11.575);

/// Point `along_m` east of `origin` then `north_m` north of that.
/// Negative values move west / south.
pub fn east_of(origin: &Point, along_m: f64, north_m: f64) -> Point {
    let on_line = offset_by_bearing(origin, along_m, std::f64::consts::FRAC_PI_2);
    offset_by_bearing(&on_line, north_m, 0.0)
}

/// Vertex `k` of the straight test road, `k * spacing_m` east of [`ORIGIN`].
pub fn vertex(k: usize, spacing_m: f64) -> Point {
    east_of(&ORIGIN, k as f64 * spacing_m, 0.0)
}

/// A straight road running east from [`ORIGIN`].
///
/// `legs[i]` is the number of directions in leg `i`; every direction has
/// `points_per_direction` vertices `spacing_m` apart, and consecutive
/// directions share their boundary vertex.
pub fn straight_route_payload(legs: &[usize], points_per_direction: usize, spacing_m: f64) -> Value {
    let step = points_per_direction - 1;
    let mut next_vertex = 0;

    let legs: Vec<Value> = legs
        .iter()
        .enumerate()
        .map(|(leg_index, &direction_count)| {
            let directions: Vec<Value> = (0..direction_count)
                .map(|d| {
                    let path: Vec<Point> = (next_vertex..=next_vertex + step)
                        .map(|k| vertex(k, spacing_m))
                        .collect();
                    next_vertex += step;
                    json!({
                        "path": path,
                        "instruction": format!("leg {leg_index} step {d}"),
                    })
                })
                .collect();
            json!({ "directions": directions })
        })
        .collect();

    json!({ "legs": legs })
}
