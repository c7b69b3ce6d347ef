// Exporter HTTP API
// This file provides the Prometheus exposition, health and service
// descriptor endpoints
//
// Numan Thabit 2025 Nov

use crate::state::{unix_millis, ExporterState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const SERVICE_NAME: &str = "RabbitMQ Stream Prometheus Exporter";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "lastScrapeUnixTimestamp")]
    pub last_scrape_unix_timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub metrics: &'static str,
    pub health: &'static str,
}

/// Create the HTTP router with the exporter endpoints
pub fn create_router(state: Arc<ExporterState>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Render the registry as it was left by the last completed refresh cycle
async fn metrics(State(state): State<Arc<ExporterState>>) -> Response {
    match state.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Healthy while the refresh loop keeps recording scrapes
async fn health(State(state): State<Arc<ExporterState>>) -> Response {
    match state.last_scrape() {
        Some(last) if state.is_fresh(unix_millis()) => Json(HealthResponse {
            status: "ok",
            last_scrape_unix_timestamp: last,
        })
        .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Last scrape is too old").into_response(),
    }
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            metrics: "/metrics",
            health: "/health",
        },
    })
}
