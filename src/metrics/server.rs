//! Scrape endpoint for exposure-cycle metrics.
//!
//! Serves the shared [`MetricsRegistry`] while the camera keeps running
//! cycles on its own thread:
//!
//! - `GET /metrics` returns the cycle counters and last-cycle gauges in
//!   Prometheus text format.
//! - `GET /health` answers `ok` with the number of cycles recorded so far,
//!   so a supervisor can tell a live but idle instrument from a stuck one.

use crate::metrics::MetricsRegistry;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Default scrape port.
pub const DEFAULT_METRICS_PORT: u16 = 9187;

/// Errors from serving metrics.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("metrics endpoint stopped: {0}")]
    Serve(io::Error),
}

/// Where the scrape endpoint listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(DEFAULT_METRICS_PORT)
    }
}

impl MetricsServerConfig {
    /// Listens on every interface at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

/// HTTP endpoint over a [`MetricsRegistry`].
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: MetricsRegistry,
}

impl MetricsServer {
    /// Creates a server reading from `registry`.
    ///
    /// The registry is shared: cycles recorded through any clone show up on
    /// the endpoint.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self { config, registry }
    }

    fn router(self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(self.registry)
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(addr = %addr, "serving exposure metrics");

        axum::serve(listener, app).await.map_err(ServerError::Serve)
    }
}

async fn scrape(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    match registry.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode exposure metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

async fn health(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    (
        StatusCode::OK,
        format!("ok cycles={}\n", registry.cycles_recorded()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactHandle;
    use crate::exposure::{CaptureMetadata, CaptureOutcome, CycleReport, CycleState};
    use chrono::Utc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn report(outcome: CaptureOutcome) -> CycleReport {
        let ok = outcome.is_ok();
        CycleReport::new(
            outcome,
            ok.then(|| ArtifactHandle::new("frame-1")),
            Some(CaptureMetadata::new(Utc::now(), -5.25, 1)),
            vec![CycleState::Idle, CycleState::Done],
            2.0,
            Duration::from_millis(2100),
        )
    }

    async fn get(registry: MetricsRegistry, path: &str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = MetricsServer::new(MetricsServerConfig::default(), registry).router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_default_port() {
        assert_eq!(
            MetricsServerConfig::default().bind_addr.port(),
            DEFAULT_METRICS_PORT
        );
    }

    #[tokio::test]
    async fn test_scrape_reports_recorded_cycles() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_cycle(&report(CaptureOutcome::Ok));
        registry.record_cycle(&report(CaptureOutcome::Aborted));

        let response = get(registry, "/metrics").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("gige_exposure_cycles_ok_total 1"));
        assert!(response.contains("gige_exposure_cycles_aborted_total 1"));
        assert!(response.contains("gige_exposure_last_exposure_seconds 2"));
        assert!(response.contains("gige_exposure_last_frame_temperature_celsius -5.25"));
    }

    #[tokio::test]
    async fn test_health_counts_cycles() {
        let registry = MetricsRegistry::new().unwrap();
        let idle = get(registry.clone(), "/health").await;
        assert!(idle.contains("ok cycles=0"));

        registry.record_cycle(&report(CaptureOutcome::Ok));
        let busy = get(registry, "/health").await;
        assert!(busy.starts_with("HTTP/1.1 200"));
        assert!(busy.contains("ok cycles=1"));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = MetricsServerConfig {
            bind_addr: taken.local_addr().unwrap(),
        };

        let result = MetricsServer::new(config, MetricsRegistry::new().unwrap())
            .run()
            .await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
