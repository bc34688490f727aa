//! Server configuration from environment.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use routewatch_core::{GeofenceRequest, NavigationRules, ReroutePolicy, Route};

#[derive(Debug, Clone)]
pub struct Config {
    pub route_file: PathBuf,
    pub geofence_file: Option<PathBuf>,
    pub rules_file: Option<PathBuf>,
    /// Route served to reroute requests by the file provider
    pub reroute_file: Option<PathBuf>,
    /// Routing service answering reroute requests over HTTP
    pub reroute_url: Option<String>,
    pub reroute_policy: ReroutePolicy,
    pub channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values fall back to
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ReroutePolicy::default();
        Self {
            route_file: lookup("ROUTEWATCH_ROUTE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("route.json")),
            geofence_file: lookup("ROUTEWATCH_GEOFENCE_FILE").map(PathBuf::from),
            rules_file: lookup("ROUTEWATCH_RULES_FILE").map(PathBuf::from),
            reroute_file: lookup("ROUTEWATCH_REROUTE_FILE").map(PathBuf::from),
            reroute_url: lookup("ROUTEWATCH_REROUTE_URL"),
            reroute_policy: ReroutePolicy {
                min_consecutive_misses: lookup("ROUTEWATCH_REROUTE_MIN_MISSES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.min_consecutive_misses),
                min_off_route_secs: lookup("ROUTEWATCH_REROUTE_MIN_OFF_ROUTE_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.min_off_route_secs),
            },
            channel_capacity: lookup("ROUTEWATCH_CHANNEL_CAPACITY")
                .and_then(|s| s.parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(256),
        }
    }

    pub fn load_route(&self) -> Result<Route> {
        let json = fs::read_to_string(&self.route_file)
            .with_context(|| format!("reading route file {}", self.route_file.display()))?;
        Route::from_json(&json)
            .with_context(|| format!("parsing route file {}", self.route_file.display()))
    }

    pub fn load_rules(&self) -> Result<NavigationRules> {
        let Some(path) = &self.rules_file else {
            return Ok(NavigationRules::default());
        };
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing rules file {}", path.display()))
    }

    /// Geofences to register at startup, a JSON array of requests.
    pub fn load_geofences(&self) -> Result<Vec<GeofenceRequest>> {
        let Some(path) = &self.geofence_file else {
            return Ok(Vec::new());
        };
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading geofence file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("parsing geofence file {}", path.display()))
    }
}
