//! Drive simulation.

pub mod paths;

pub use paths::{DetourPath, DrivePath, PolylinePath};

use chrono::{DateTime, Duration, Utc};
use routewatch_core::PositionFix;

/// Sample a drive at a fixed rate, from `start` until the drive ends.
///
/// The final position is always included.
pub fn simulate_fixes(path: &dyn DrivePath, start: DateTime<Utc>, rate_hz: f64) -> Vec<PositionFix> {
    let step_s = 1.0 / rate_hz.max(0.01);
    let duration = path.duration();

    let mut fixes = Vec::new();
    let mut tick: u64 = 0;
    loop {
        let t = (tick as f64 * step_s).min(duration);
        let at = start + Duration::milliseconds((t * 1000.0).round() as i64);
        fixes.push(PositionFix::new(path.position(t), at));
        if t >= duration {
            break;
        }
        tick += 1;
    }
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewatch_core::{geo, Point};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_simulate_fixes_covers_whole_drive() {
        let start = Point::new(33.6846, -117.8265);
        let end = geo::offset_by_bearing(&start, 95.0, FRAC_PI_2);
        let path = PolylinePath::new(vec![start, end], 10.0);
        let t0 = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let fixes = simulate_fixes(&path, t0, 1.0);

        // 0..9 s plus the clamped end point.
        assert_eq!(fixes.len(), 11);
        assert_eq!(fixes[0].point, start);
        assert_eq!(fixes[0].timestamp, t0);
        assert!(geo::distance(&fixes[10].point, &end) < 0.01);
        assert!(fixes
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
    }
}
