//! Routewatch server - tracks a device along a route.
//!
//! Position fixes arrive as JSON lines on stdin; notifications leave as
//! JSON lines on stdout. Logs go to stderr.

use anyhow::Result;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routewatch_core::NavigationEngine;
use routewatch_server::config::Config;
use routewatch_server::fix_source::{publish_json_lines, FixSource};
use routewatch_server::loops::navigation_loop::{run_navigation_loop, NavigationHandle};
use routewatch_server::loops::notification_writer::run_notification_writer;
use routewatch_server::loops::reroute_loop::run_reroute_loop;
use routewatch_server::provider::{FileRouteProvider, HttpRouteProvider};
use routewatch_server::sink::FanoutSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("routewatch_server=debug".parse()?))
        .init();

    tracing::info!("Starting routewatch server...");

    let config = Config::from_env();
    let rules = config.load_rules()?;
    let route = config.load_route()?;
    let geofences = config.load_geofences()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let fixes = FixSource::new(config.channel_capacity);
    let mut sink = FanoutSink::new(config.channel_capacity);
    let writer_rx = sink.subscribe_all();
    let reroute_rx = sink.subscribe();

    let mut engine = NavigationEngine::new(rules, sink);
    engine.set_route(route);
    for request in geofences {
        match engine.add_geofence(request) {
            Some(id) => tracing::info!("Registered geofence {}", id),
            None => tracing::warn!("Skipping geofence without coordinates"),
        }
    }

    let (navigation, commands) = NavigationHandle::channel(config.channel_capacity);
    let nav_task = tokio::spawn(run_navigation_loop(
        engine,
        fixes.clone(),
        commands,
        shutdown_tx.subscribe(),
    ));
    let writer_task = tokio::spawn(run_notification_writer(writer_rx, tokio::io::stdout()));

    // Start background reroute loop when a provider is configured
    if let Some(url) = &config.reroute_url {
        tokio::spawn(run_reroute_loop(
            HttpRouteProvider::new(url)?,
            config.reroute_policy.clone(),
            reroute_rx,
            navigation.clone(),
            shutdown_tx.subscribe(),
        ));
    } else if let Some(path) = &config.reroute_file {
        tokio::spawn(run_reroute_loop(
            FileRouteProvider::new(path),
            config.reroute_policy.clone(),
            reroute_rx,
            navigation.clone(),
            shutdown_tx.subscribe(),
        ));
    } else {
        drop(reroute_rx);
    }

    navigation.start().await?;

    tokio::select! {
        published = publish_json_lines(tokio::io::stdin(), &fixes) => {
            tracing::info!("Input closed after {} fix(es)", published?);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    if let Err(err) = navigation.stop().await {
        tracing::warn!("Stop not delivered: {}", err);
    }
    let _ = shutdown_tx.send(());
    nav_task.await?;
    writer_task.await??;

    Ok(())
}
