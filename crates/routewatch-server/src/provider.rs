//! Routing providers answering reroute requests.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use routewatch_core::{RerouteRequest, Route, RoutePayload};

/// Something that can produce a new route for a reroute request.
pub trait RouteProvider: Send + Sync {
    fn fetch(&self, request: &RerouteRequest) -> impl Future<Output = Result<Route>> + Send;
}

/// Serves the same route file for every request.
#[derive(Debug, Clone)]
pub struct FileRouteProvider {
    path: PathBuf,
}

impl FileRouteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RouteProvider for FileRouteProvider {
    async fn fetch(&self, request: &RerouteRequest) -> Result<Route> {
        tracing::debug!(
            "Reading reroute from {} for origin {:?}",
            self.path.display(),
            request.origin
        );
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading reroute file {}", self.path.display()))?;
        Ok(Route::from_json(&json)?)
    }
}

/// POSTs the request as JSON and expects a route payload back.
#[derive(Debug, Clone)]
pub struct HttpRouteProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRouteProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl RouteProvider for HttpRouteProvider {
    async fn fetch(&self, request: &RerouteRequest) -> Result<Route> {
        let payload: RoutePayload = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("requesting route from {}", self.url))?
            .error_for_status()?
            .json()
            .await
            .context("decoding route payload")?;
        Ok(Route::normalize(payload)?)
    }
}
