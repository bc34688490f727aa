//! Navigation loop.
//!
//! Owns the engine and is the only place it is touched: route installation
//! and replacement, start/stop, geofence edits and per-fix processing are
//! all serialized through one `select!`, so a fix never sees a route that
//! is half replaced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use routewatch_core::{
    GeofenceRequest, NavigationEngine, NavigationError, NavigationState, NotificationSink,
    PositionFix, Route, TrackingState,
};

use crate::fix_source::{FixSource, FixSubscription};

/// Requests handled by the navigation loop, each with its reply channel.
#[derive(Debug)]
pub enum NavCommand {
    SetRoute {
        route: Route,
        reply: oneshot::Sender<()>,
    },
    /// Replace the route only if `expected` is still the installed one.
    ReplaceRoute {
        route: Route,
        expected: Arc<Route>,
        reply: oneshot::Sender<bool>,
    },
    Start {
        reply: oneshot::Sender<Result<(), NavigationError>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    AddGeofence {
        request: GeofenceRequest,
        reply: oneshot::Sender<Option<String>>,
    },
    RemoveGeofence {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub tracking: TrackingState,
    pub state: NavigationState,
    pub route: Option<Arc<Route>>,
    pub geofence_count: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("navigation loop has shut down")]
    LoopClosed,

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// Cloneable client for the navigation loop.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: mpsc::Sender<NavCommand>,
}

impl NavigationHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NavCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> NavCommand,
    ) -> Result<T, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| CommandError::LoopClosed)?;
        rx.await.map_err(|_| CommandError::LoopClosed)
    }

    pub async fn set_route(&self, route: Route) -> Result<(), CommandError> {
        self.request(|reply| NavCommand::SetRoute { route, reply }).await
    }

    /// Returns `false` if the route changed since `expected` was observed.
    pub async fn replace_route(&self, route: Route, expected: Arc<Route>) -> Result<bool, CommandError> {
        self.request(|reply| NavCommand::ReplaceRoute {
            route,
            expected,
            reply,
        })
        .await
    }

    pub async fn start(&self) -> Result<(), CommandError> {
        self.request(|reply| NavCommand::Start { reply }).await??;
        Ok(())
    }

    pub async fn stop(&self) -> Result<bool, CommandError> {
        self.request(|reply| NavCommand::Stop { reply }).await
    }

    pub async fn add_geofence(&self, request: GeofenceRequest) -> Result<Option<String>, CommandError> {
        self.request(|reply| NavCommand::AddGeofence { request, reply })
            .await
    }

    pub async fn remove_geofence(&self, id: impl Into<String>) -> Result<bool, CommandError> {
        let id = id.into();
        self.request(|reply| NavCommand::RemoveGeofence { id, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, CommandError> {
        self.request(|reply| NavCommand::Snapshot { reply }).await
    }
}

/// Start the navigation loop.
///
/// Fixes are only consumed while the engine is started; the subscription
/// is taken on `Start` and released on `Stop`, on shutdown and when the
/// loop exits for any reason. Buffered fixes are drained before the next
/// command is handled.
pub async fn run_navigation_loop<S: NotificationSink>(
    mut engine: NavigationEngine<S>,
    fixes: FixSource,
    mut commands: mpsc::Receiver<NavCommand>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut subscription: Option<FixSubscription> = None;
    let mut last_fix_at: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("Navigation loop shutting down");
                break;
            }
            maybe_fix = next_fix(&mut subscription) => {
                match maybe_fix {
                    Some(fix) => handle_fix(&mut engine, &fix, &mut last_fix_at),
                    None => {
                        tracing::warn!("Fix channel closed");
                        subscription = None;
                    }
                }
            }
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(command) => handle_command(
                        &mut engine,
                        command,
                        &fixes,
                        &mut subscription,
                        &mut last_fix_at,
                    ),
                    None => {
                        tracing::info!("Navigation command channel closed");
                        break;
                    }
                }
            }
        }
    }

    drop(subscription);
    engine.stop();
}

async fn next_fix(subscription: &mut Option<FixSubscription>) -> Option<PositionFix> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

fn handle_fix<S: NotificationSink>(
    engine: &mut NavigationEngine<S>,
    fix: &PositionFix,
    last_fix_at: &mut Option<DateTime<Utc>>,
) {
    if last_fix_at.is_some_and(|last| fix.timestamp <= last) {
        tracing::debug!("Skipping stale fix from {}", fix.timestamp);
        return;
    }
    if !fix.point.is_valid() {
        tracing::warn!("Skipping fix with invalid coordinates {:?}", fix.point);
        return;
    }

    *last_fix_at = Some(fix.timestamp);
    if let Err(err) = engine.process_fix(fix) {
        tracing::warn!("Fix not processed: {}", err);
    }
}

fn handle_command<S: NotificationSink>(
    engine: &mut NavigationEngine<S>,
    command: NavCommand,
    fixes: &FixSource,
    subscription: &mut Option<FixSubscription>,
    last_fix_at: &mut Option<DateTime<Utc>>,
) {
    match command {
        NavCommand::SetRoute { route, reply } => {
            engine.set_route(route);
            let _ = reply.send(());
        }
        NavCommand::ReplaceRoute {
            route,
            expected,
            reply,
        } => {
            let current = engine
                .route()
                .is_some_and(|installed| Arc::ptr_eq(installed, &expected));
            if current {
                engine.replace_route(route);
            } else {
                tracing::debug!("Discarding reroute for a route that is no longer installed");
            }
            let _ = reply.send(current);
        }
        NavCommand::Start { reply } => {
            // Subscribe before reading the last fix so nothing published in
            // between is missed; the timestamp check drops the duplicate.
            // An existing subscription is kept as is.
            let fresh = subscription.is_none().then(|| fixes.subscribe());
            let last_fix = fixes.last_fix();
            let result = engine.start(Utc::now(), last_fix.as_ref()).map(|replayed| {
                if let Some(info) = replayed {
                    *last_fix_at = Some(info.raw.timestamp);
                }
                if let Some(fresh) = fresh {
                    *subscription = Some(fresh);
                }
            });
            let _ = reply.send(result);
        }
        NavCommand::Stop { reply } => {
            let stopped = engine.stop();
            *subscription = None;
            let _ = reply.send(stopped);
        }
        NavCommand::AddGeofence { request, reply } => {
            let _ = reply.send(engine.add_geofence(request));
        }
        NavCommand::RemoveGeofence { id, reply } => {
            let _ = reply.send(engine.remove_geofence(&id).is_some());
        }
        NavCommand::Snapshot { reply } => {
            let _ = reply.send(EngineSnapshot {
                tracking: engine.tracking_state(),
                state: engine.state().clone(),
                route: engine.route().cloned(),
                geofence_count: engine.geofences().len(),
            });
        }
    }
}
