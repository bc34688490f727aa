//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use routewatch_core::geo::offset_by_bearing;
use routewatch_core::{NavigationEngine, NavigationRules, Notification, Point, PositionFix, Route};
use routewatch_server::fix_source::FixSource;
use routewatch_server::loops::navigation_loop::{run_navigation_loop, NavigationHandle};
use routewatch_server::sink::FanoutSink;

pub const ORIGIN: Point = Point::new(33.6846, -117.8265);
pub const SPACING_M: f64 = 20.0;

/// `along_m` east of [`ORIGIN`], then `north_m` north.
pub fn position(along_m: f64, north_m: f64) -> Point {
    let on_road = offset_by_bearing(&ORIGIN, along_m, FRAC_PI_2);
    offset_by_bearing(&on_road, north_m, 0.0)
}

pub fn fix(along_m: f64, north_m: f64, secs: i64) -> PositionFix {
    PositionFix::new(position(along_m, north_m), at(secs))
}

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

/// Straight road east from [`ORIGIN`]: two legs of two directions, each
/// direction three vertices 20m apart (160m in total).
pub fn east_route() -> Route {
    let mut vertex = 0;
    let legs: Vec<Value> = (0..2)
        .map(|_| {
            let directions: Vec<Value> = (0..2)
                .map(|_| {
                    let path: Vec<Point> = (vertex..=vertex + 2)
                        .map(|k| position(k as f64 * SPACING_M, 0.0))
                        .collect();
                    vertex += 2;
                    json!({ "path": path })
                })
                .collect();
            json!({ "directions": directions })
        })
        .collect();
    Route::from_value(json!({ "legs": legs })).unwrap()
}

/// Straight road east from [`ORIGIN`] with `legs` legs of one direction
/// each, three vertices 20m apart per direction (40m per leg).
pub fn long_east_route(legs: usize) -> Route {
    let legs: Vec<Value> = (0..legs)
        .map(|leg| {
            let path: Vec<Point> = (2 * leg..=2 * leg + 2)
                .map(|k| position(k as f64 * SPACING_M, 0.0))
                .collect();
            json!({ "directions": [{ "path": path }] })
        })
        .collect();
    Route::from_value(json!({ "legs": legs })).unwrap()
}

/// Road running north from `start_north_m` north of [`ORIGIN`].
pub fn north_route(start_north_m: f64) -> Route {
    let path: Vec<Point> = (0..5)
        .map(|k| position(0.0, start_north_m + k as f64 * SPACING_M))
        .collect();
    Route::from_value(json!({ "directions": [{ "path": path }] })).unwrap()
}

pub struct Harness {
    pub navigation: NavigationHandle,
    pub fixes: FixSource,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub shutdown: broadcast::Sender<()>,
    pub task: JoinHandle<()>,
    pub sink: FanoutSink,
}

pub fn spawn_navigation(route: Route) -> Harness {
    spawn_engine(Some(route))
}

pub fn spawn_engine(route: Option<Route>) -> Harness {
    let fixes = FixSource::new(64);
    let mut sink = FanoutSink::new(64);
    let notifications = sink.subscribe_all();
    let (shutdown, _) = broadcast::channel(1);
    let (navigation, commands) = NavigationHandle::channel(16);

    let mut engine = NavigationEngine::new(NavigationRules::default(), sink.clone());
    if let Some(route) = route {
        engine.set_route(route);
    }
    let task = tokio::spawn(run_navigation_loop(
        engine,
        fixes.clone(),
        commands,
        shutdown.subscribe(),
    ));

    Harness {
        navigation,
        fixes,
        notifications,
        shutdown,
        task,
        sink,
    }
}

pub async fn next_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

/// Receive `n` notifications and return their names.
pub async fn next_names(rx: &mut mpsc::UnboundedReceiver<Notification>, n: usize) -> Vec<&'static str> {
    let mut names = Vec::with_capacity(n);
    for _ in 0..n {
        names.push(next_notification(rx).await.name());
    }
    names
}
