//! Reroute loop.
//!
//! Watches `offroute` notifications, applies the reroute policy and installs
//! the provider's route through the navigation loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use routewatch_core::{Notification, ReroutePolicy, RerouteRequest, Route};

use crate::backoff::Backoff;
use crate::loops::navigation_loop::NavigationHandle;
use crate::provider::RouteProvider;

const REROUTE_BACKOFF_BASE_SECS: u64 = 2;
const REROUTE_BACKOFF_MAX_SECS: u64 = 60;

/// Start the reroute loop.
pub async fn run_reroute_loop<P: RouteProvider>(
    provider: P,
    policy: ReroutePolicy,
    mut notifications: broadcast::Receiver<Notification>,
    navigation: NavigationHandle,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut backoff = Backoff::new(
        Duration::from_secs(REROUTE_BACKOFF_BASE_SECS),
        Duration::from_secs(REROUTE_BACKOFF_MAX_SECS),
    );
    // Route most recently replaced; its queued offroute notifications are stale.
    let mut replaced: Option<Arc<Route>> = None;

    loop {
        let notification = tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Reroute loop shutting down");
                break;
            }
            received = notifications.recv() => match received {
                Ok(notification) => notification,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Reroute loop lagged, skipped {} notification(s)", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let Notification::OffRoute {
            route,
            fix,
            leg_index,
            consecutive_misses,
            off_route_secs,
            ..
        } = notification
        else {
            continue;
        };

        if replaced.as_ref().is_some_and(|old| Arc::ptr_eq(old, &route)) {
            continue;
        }
        if !policy.should_reroute(consecutive_misses, off_route_secs) || !backoff.ready() {
            continue;
        }
        let Some(request) = RerouteRequest::for_route(&route, &fix, leg_index) else {
            continue;
        };

        tracing::info!(
            "Requesting reroute after {} miss(es), {:.1}s off route",
            consecutive_misses,
            off_route_secs
        );
        let new_route = match provider.fetch(&request).await {
            Ok(new_route) => new_route,
            Err(err) => {
                let delay = backoff.fail();
                tracing::warn!("Reroute failed: {:#} (backing off {:?})", err, delay);
                continue;
            }
        };
        backoff.reset();

        match navigation.replace_route(new_route, Arc::clone(&route)).await {
            Ok(true) => {
                tracing::info!("Reroute installed");
                replaced = Some(route);
            }
            Ok(false) => tracing::debug!("Reroute superseded by a newer route"),
            Err(err) => {
                tracing::warn!("Reroute not installed: {}", err);
                break;
            }
        }
    }
}
