//! Drive path implementations.

use std::f64::consts::FRAC_PI_2;

use routewatch_core::geo;
use routewatch_core::{Point, Route};

/// Trait for simulated drives.
pub trait DrivePath: Send + Sync {
    /// Position at time t seconds from the start of the drive.
    fn position(&self, t: f64) -> Point;

    /// Seconds until the drive reaches its end.
    fn duration(&self) -> f64;

    /// Approximate heading at time t (radians, 0 = north).
    fn heading(&self, t: f64) -> f64 {
        // Default: estimate heading from position delta
        let from = self.position(t);
        let to = self.position(t + 0.5);
        if geo::distance(&from, &to) == 0.0 {
            // Stationary or at the end; look backward instead.
            let before = self.position((t - 0.5).max(0.0));
            return geo::bearing(&before, &from);
        }
        geo::bearing(&from, &to)
    }
}

/// Drives along a polyline at constant speed.
pub struct PolylinePath {
    points: Vec<Point>,
    /// Distance from the first point to each point
    cumulative_m: Vec<f64>,
    pub speed_mps: f64,
}

impl PolylinePath {
    pub fn new(points: Vec<Point>, speed_mps: f64) -> Self {
        let mut deduped: Vec<Point> = Vec::with_capacity(points.len());
        for point in points {
            if deduped.last() != Some(&point) {
                deduped.push(point);
            }
        }

        let mut cumulative_m = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        for (i, point) in deduped.iter().enumerate() {
            if i > 0 {
                total += geo::distance(&deduped[i - 1], point);
            }
            cumulative_m.push(total);
        }

        Self {
            points: deduped,
            cumulative_m,
            speed_mps: speed_mps.max(0.1),
        }
    }

    /// Follow every direction of a route, in order.
    pub fn along_route(route: &Route, speed_mps: f64) -> Self {
        let points = route
            .directions()
            .iter()
            .flat_map(|direction| direction.path.iter().copied())
            .collect();
        Self::new(points, speed_mps)
    }

    pub fn length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    fn point_at(&self, distance_m: f64) -> Option<Point> {
        let last = *self.points.last()?;
        if distance_m >= self.length_m() {
            return Some(last);
        }

        // First point strictly beyond the requested distance ends the segment.
        let end = self
            .cumulative_m
            .partition_point(|&d| d <= distance_m)
            .clamp(1, self.points.len() - 1);
        let start = end - 1;
        let segment = self.cumulative_m[end] - self.cumulative_m[start];
        let fraction = if segment > 0.0 {
            (distance_m - self.cumulative_m[start]) / segment
        } else {
            0.0
        };
        Some(geo::interpolate(&self.points[start], &self.points[end], fraction))
    }
}

impl DrivePath for PolylinePath {
    fn position(&self, t: f64) -> Point {
        self.point_at(self.speed_mps * t.max(0.0))
            .unwrap_or(Point::new(0.0, 0.0))
    }

    fn duration(&self) -> f64 {
        self.length_m() / self.speed_mps
    }
}

/// Wraps another drive and pushes it sideways for a while, leaving the road.
pub struct DetourPath<P> {
    pub inner: P,
    pub start_s: f64,
    pub end_s: f64,
    /// Sideways distance, positive to the right of travel
    pub offset_m: f64,
}

impl<P: DrivePath> DetourPath<P> {
    pub fn new(inner: P, start_s: f64, end_s: f64, offset_m: f64) -> Self {
        Self {
            inner,
            start_s,
            end_s,
            offset_m,
        }
    }

    fn in_detour(&self, t: f64) -> bool {
        t >= self.start_s && t < self.end_s
    }
}

impl<P: DrivePath> DrivePath for DetourPath<P> {
    fn position(&self, t: f64) -> Point {
        let on_road = self.inner.position(t);
        if !self.in_detour(t) {
            return on_road;
        }
        let sideways = self.inner.heading(t) + FRAC_PI_2;
        geo::offset_by_bearing(&on_road, self.offset_m, sideways)
    }

    fn duration(&self) -> f64 {
        self.inner.duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn east_road() -> PolylinePath {
        let start = Point::new(33.6846, -117.8265);
        let points = vec![
            start,
            geo::offset_by_bearing(&start, 100.0, FRAC_PI_2),
            geo::offset_by_bearing(&start, 200.0, FRAC_PI_2),
        ];
        PolylinePath::new(points, 10.0)
    }

    #[test]
    fn test_polyline_path_start_and_end() {
        let path = east_road();
        assert_eq!(path.position(0.0), path.points[0]);
        assert_eq!(path.position(path.duration() + 100.0), path.points[2]);
        assert!((path.duration() - 20.0).abs() <= 0.2);
    }

    #[test]
    fn test_polyline_path_advances_at_speed() {
        let path = east_road();
        let start = path.position(0.0);
        let after_5s = path.position(5.0);
        let d = geo::distance(&start, &after_5s);
        assert!((d - 50.0).abs() <= 1.0, "moved {d}m");

        let heading = path.heading(5.0);
        assert!((heading - FRAC_PI_2).abs() < 0.01);
    }

    #[test]
    fn test_duplicate_points_are_dropped() {
        let path = PolylinePath::new(
            vec![Point::new(1.0, 1.0), Point::new(1.0, 1.0), Point::new(1.0, 1.001)],
            5.0,
        );
        assert_eq!(path.points.len(), 2);
        assert_eq!(path.position(0.0), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_empty_path_stays_put() {
        let path = PolylinePath::new(Vec::new(), 5.0);
        assert_eq!(path.duration(), 0.0);
        assert_eq!(path.position(3.0), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_detour_only_inside_window() {
        let detour = DetourPath::new(east_road(), 5.0, 10.0, 80.0);

        assert_eq!(detour.position(2.0), detour.inner.position(2.0));
        assert_eq!(detour.position(12.0), detour.inner.position(12.0));

        let on_road = detour.inner.position(7.0);
        let off_road = detour.position(7.0);
        let d = geo::distance(&on_road, &off_road);
        assert!((d - 80.0).abs() <= 1.0, "offset {d}m");
        // Heading east, so right of travel is south.
        assert!((geo::bearing(&on_road, &off_road).abs() - PI).abs() < 0.01);
    }
}
