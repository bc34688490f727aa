//! Route replay - runs recorded position fixes through the tracker.
//!
//! Fixes are read as JSON lines (from a file or stdin) and every
//! notification is printed as a JSON line on stdout.
//!
//! Usage:
//!   simulate_drive route.json | replay_route route.json
//!   replay_route route.json --fixes drive.jsonl --geofences zones.json --summary

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use routewatch_core::{
    GeofenceRequest, NavigationEngine, NavigationRules, Notification, PositionFix,
    ReroutePolicy, RerouteRequest, Route,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay position fixes against a route", long_about = None)]
struct Args {
    /// Route JSON file
    route: PathBuf,

    /// JSON-lines fix file, stdin when omitted
    #[arg(long)]
    fixes: Option<PathBuf>,

    /// Navigation rules JSON file
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Geofence requests JSON file (an array)
    #[arg(long)]
    geofences: Option<PathBuf>,

    /// Route to switch to once the reroute policy triggers
    #[arg(long)]
    reroute: Option<PathBuf>,

    /// Consecutive off-route fixes before rerouting
    #[arg(long, default_value_t = 3)]
    reroute_misses: u32,

    /// Seconds off route before rerouting
    #[arg(long, default_value_t = 10.0)]
    reroute_secs: f64,

    /// Print only per-notification counts instead of every notification
    #[arg(long)]
    summary: bool,
}

/// Replay driver: the engine plus the pending reroute.
struct Replay {
    engine: NavigationEngine<Vec<Notification>>,
    policy: ReroutePolicy,
    reroute: Option<Route>,
    counts: BTreeMap<&'static str, u64>,
    print: bool,
}

impl Replay {
    /// Print (or count) everything the engine emitted, then reroute when an
    /// `offroute` among it calls for one.
    fn drain(&mut self) -> Result<()> {
        let notifications = std::mem::take(self.engine.sink_mut());
        let mut request = None;

        for notification in &notifications {
            *self.counts.entry(notification.name()).or_default() += 1;
            if self.print {
                println!("{}", serde_json::to_string(notification)?);
            }

            if let Notification::OffRoute {
                route,
                fix,
                leg_index,
                consecutive_misses,
                off_route_secs,
                ..
            } = notification
            {
                if self.reroute.is_some()
                    && self.policy.should_reroute(*consecutive_misses, *off_route_secs)
                {
                    request = RerouteRequest::for_route(route, fix, *leg_index);
                }
            }
        }

        if let Some(request) = request {
            if let Some(route) = self.reroute.take() {
                tracing::info!(
                    "Rerouting from ({:.5}, {:.5}) with {} waypoint(s)",
                    request.origin.lat,
                    request.origin.lng,
                    request.waypoints.len()
                );
                self.engine.replace_route(route);
            }
        }
        Ok(())
    }

    fn process(&mut self, fix: &PositionFix) -> Result<()> {
        self.engine.process_fix(fix)?;
        self.drain()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {what} {}", path.display()))
}

fn read_route(path: &Path) -> Result<Route> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading route {}", path.display()))?;
    Route::from_json(&json).with_context(|| format!("parsing route {}", path.display()))
}

async fn replay_lines<R: AsyncRead + Unpin>(reader: R, replay: &mut Replay) -> Result<u64> {
    let mut lines = BufReader::new(reader).lines();
    let mut replayed = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<PositionFix>(line) {
            Ok(fix) => {
                replay.process(&fix)?;
                replayed += 1;
            }
            Err(err) => tracing::warn!("Skipping malformed fix: {}", err),
        }
    }
    Ok(replayed)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("replay_route=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let route = Arc::new(read_route(&args.route)?);
    let rules = match &args.rules {
        Some(path) => read_json::<NavigationRules>(path, "rules")?,
        None => NavigationRules::default(),
    };
    let geofences = match &args.geofences {
        Some(path) => read_json::<Vec<GeofenceRequest>>(path, "geofences")?,
        None => Vec::new(),
    };
    let reroute = args.reroute.as_deref().map(read_route).transpose()?;

    let mut engine = NavigationEngine::new(rules, Vec::new());
    engine.set_route(Arc::clone(&route));
    for request in geofences {
        if engine.add_geofence(request).is_none() {
            tracing::warn!("Skipping geofence without coordinates");
        }
    }

    let mut replay = Replay {
        engine,
        policy: ReroutePolicy {
            min_consecutive_misses: args.reroute_misses,
            min_off_route_secs: args.reroute_secs,
        },
        reroute,
        counts: BTreeMap::new(),
        print: !args.summary,
    };

    replay.engine.start(chrono::Utc::now(), None)?;
    replay.drain()?;

    let replayed = match &args.fixes {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening fixes {}", path.display()))?;
            replay_lines(file, &mut replay).await?
        }
        None => replay_lines(tokio::io::stdin(), &mut replay).await?,
    };

    replay.engine.stop();
    replay.drain()?;

    tracing::info!(
        "Replayed {} fix(es) over {} leg(s), ended {:?}",
        replayed,
        route.leg_count(),
        replay.engine.tracking_state()
    );
    if args.summary {
        println!("{}", serde_json::to_string_pretty(&replay.counts)?);
    }
    Ok(())
}
