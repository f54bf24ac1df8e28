//! Health, readiness and Prometheus endpoints of the notifier.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> eyre::Result<()> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics initialized");
        Ok::<_, eyre::Report>(handle)
    })?;
    Ok(())
}

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub redis: Arc<ConnectionManager>,
    pub app_name: String,
    pub app_version: String,
    pub stream_name: String,
}

impl HealthState {
    pub fn new(
        redis: Arc<ConnectionManager>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            app_name: app_name.into(),
            app_version: app_version.into(),
            stream_name: stream_name.into(),
        }
    }
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub version: String,
    pub stream: String,
}

/// Liveness probe. OK whenever the process is serving.
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
        stream: state.stream_name,
    })
}

/// Readiness probe. Ready when Redis answers PING.
pub async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut conn = (*state.redis).clone();
    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    match result {
        Ok(response) if response == "PONG" => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "redis": "ok" }
            })),
        )),
        Ok(response) => Err(not_ready(format!("unexpected response: {}", response))),
        Err(e) => Err(not_ready(format!("error: {}", e))),
    }
}

fn not_ready(redis_check: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "not_ready",
            "checks": { "redis": redis_check }
        })),
    )
}

/// Prometheus scrape endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics not initialized".to_string(),
        ),
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            name: "qa_answer_notifier".to_string(),
            version: "0.1.0".to_string(),
            stream: "qa:answer-events".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"stream\":\"qa:answer-events\""));
    }

    #[test]
    fn test_not_ready_body() {
        let (status, Json(body)) = not_ready("error: connection refused".to_string());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["redis"], "error: connection refused");
    }
}
