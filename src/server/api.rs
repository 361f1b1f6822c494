//! Cache HTTP API.
//!
//! - GET /v1/cache/{key}
//! - PUT /v1/cache/{key}
//! - GET /v1/cache/stats
//! - GET /v1/events
//! - GET /v1/events/stream
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::cache::{Cache, CacheError, CacheStats, Event};
use crate::config::Config;
use crate::server::streaming::events_to_sse_stream;

/// Application state shared across handlers.
pub struct AppState {
    pub cache: Cache<String, String>,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/cache/stats", get(cache_stats))
        .route("/v1/cache/{key}", get(get_value).put(put_value))
        .route("/v1/events", get(list_events))
        .route("/v1/events/stream", get(stream_events))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PutValueRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Configured listen address.
    pub listen: String,
    pub cache: CacheStats,
}

/// Maps cache failures onto HTTP statuses.
pub struct ApiError(CacheError);

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CacheError::LoadFailure(_) => StatusCode::NOT_FOUND,
            CacheError::PersistFailure(_) => StatusCode::BAD_GATEWAY,
            CacheError::Configuration(_) | CacheError::Dispatch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn get_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    info!(request_id, key, "Get request");

    let value = state.cache.get(key.clone()).await?;
    Ok(Json(ValueResponse { key, value }))
}

async fn put_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(req): Json<PutValueRequest>,
) -> Result<StatusCode, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    info!(request_id, key, bytes = req.value.len(), "Set request");

    state.cache.set(key, req.value).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<Event<String, String>>> {
    Json(state.cache.event_log())
}

async fn stream_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.cache.subscribe();
    Sse::new(events_to_sse_stream(rx)).keep_alive(KeepAlive::default())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        listen: state.config.server.listen.clone(),
        cache: state.cache.stats().await,
    })
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    let body = state.cache.metrics().render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
