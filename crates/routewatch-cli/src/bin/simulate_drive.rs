//! Simulated drive - prints position fixes along a route as JSON lines.
//!
//! The output can be piped straight into `routewatch-server` or
//! `replay_route`.
//!
//! Usage:
//!   cargo run -p routewatch-cli --bin simulate_drive -- route.json --speed 15
//!   cargo run -p routewatch-cli --bin simulate_drive -- route.json \
//!       --detour-start 20 --detour-end 35 --detour-offset 80

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::time::{interval, Duration};

use routewatch_cli::sim::{simulate_fixes, DetourPath, DrivePath, PolylinePath};
use routewatch_core::Route;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a route and print position fixes", long_about = None)]
struct Args {
    /// Route JSON file
    route: PathBuf,

    /// Driving speed in m/s
    #[arg(long, default_value_t = 12.0)]
    speed: f64,

    /// Fixes per second
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Timestamp of the first fix (epoch ms), defaults to now
    #[arg(long)]
    start_ms: Option<i64>,

    /// Seconds into the drive when the detour begins
    #[arg(long, requires = "detour_end")]
    detour_start: Option<f64>,

    /// Seconds into the drive when the detour ends
    #[arg(long, requires = "detour_start")]
    detour_end: Option<f64>,

    /// Sideways detour distance in meters (positive is right of travel)
    #[arg(long, default_value_t = 80.0)]
    detour_offset: f64,

    /// Emit fixes at wall-clock pace instead of all at once
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simulate_drive=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.rate <= 0.0 {
        bail!("--rate must be positive");
    }

    let json = tokio::fs::read_to_string(&args.route)
        .await
        .with_context(|| format!("reading route {}", args.route.display()))?;
    let route = Route::from_json(&json)
        .with_context(|| format!("parsing route {}", args.route.display()))?;

    let road = PolylinePath::along_route(&route, args.speed);
    tracing::info!(
        "Driving {:.0}m in {:.1}s at {} m/s",
        road.length_m(),
        road.duration(),
        args.speed
    );

    let path: Box<dyn DrivePath> = match (args.detour_start, args.detour_end) {
        (Some(start_s), Some(end_s)) => {
            tracing::info!(
                "Detour {}m off the road between {}s and {}s",
                args.detour_offset,
                start_s,
                end_s
            );
            Box::new(DetourPath::new(road, start_s, end_s, args.detour_offset))
        }
        _ => Box::new(road),
    };

    let start = match args.start_ms {
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .with_context(|| format!("start timestamp {ms} out of range"))?,
        None => Utc::now(),
    };
    let fixes = simulate_fixes(path.as_ref(), start, args.rate);

    let mut ticker = interval(Duration::from_secs_f64(1.0 / args.rate));
    let mut stdout = std::io::stdout().lock();
    for fix in &fixes {
        if args.realtime {
            ticker.tick().await;
        }
        serde_json::to_writer(&mut stdout, fix)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    tracing::info!("Emitted {} fix(es)", fixes.len());
    Ok(())
}
