//! SmileScript HTTP REST API
//!
//! Axum-based HTTP server for creating, listing and regenerating call
//! transcript summaries.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`, so the logic can be tested
//! without going through the router.
//!
//! Endpoints:
//! - GET  /                 : welcome message
//! - GET  /health           : health check with DB status
//! - POST /summarize        : summarize and store a transcript
//! - GET  /summaries        : list stored summaries, newest first
//! - PUT  /re-summarize/:id : regenerate the summary of a stored transcript
//!
//! CORS is permissive: any origin, method and header is allowed.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use smilescript_core::{SmileConfig, Summarizer};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::subsystems::comm_logs::{self, CommLogError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: SqlitePool,
    pub config: SmileConfig,
    pub summarizer: Summarizer,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/summarize", post(summarize_handler))
        .route("/summaries", get(summaries_handler))
        .route("/re-summarize/:id", put(resummarize_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: SqlitePool,
    config: SmileConfig,
    summarizer: Summarizer,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        pool,
        config,
        summarizer,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("SmileScript API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub transcript: String,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

impl From<ErrorResponse> for serde_json::Value {
    fn from(e: ErrorResponse) -> Self {
        serde_json::json!({
            "error": e.error,
            "status": e.status,
        })
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({
        "message": "Welcome to SmileScript API",
    })
}

/// Inner health check: queries DB and returns (status_code, json_body).
/// Also reports which summarizer model is configured and whether remote
/// summarization is active.
pub async fn health_inner(pool: &SqlitePool, config: &SmileConfig) -> (StatusCode, serde_json::Value) {
    match smilescript_core::db::health_check(pool).await {
        Ok(v) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "sqlite": v,
                "model": config.summarizer.model,
                "remote_summarization": config.summarizer.remote_enabled(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner summarize: validates the transcript, summarizes and stores it.
pub async fn summarize_inner(
    pool: &SqlitePool,
    summarizer: &Summarizer,
    req: TranscriptRequest,
) -> (StatusCode, serde_json::Value) {
    match comm_logs::create_comm_log(req.transcript, pool, summarizer).await {
        Ok(log) => (StatusCode::CREATED, serde_json::json!(log)),
        Err(e) => error_to_http(e),
    }
}

/// Inner list: all stored summaries, newest first.
pub async fn summaries_inner(pool: &SqlitePool) -> (StatusCode, serde_json::Value) {
    match comm_logs::list_comm_logs(pool).await {
        Ok(logs) => (StatusCode::OK, serde_json::json!(logs)),
        Err(e) => error_to_http(e),
    }
}

/// Inner re-summarize: regenerates the summary of an existing record.
pub async fn resummarize_inner(
    pool: &SqlitePool,
    summarizer: &Summarizer,
    id: i64,
) -> (StatusCode, serde_json::Value) {
    match comm_logs::regenerate_summary(id, pool, summarizer).await {
        Ok(log) => (StatusCode::OK, serde_json::json!(log)),
        Err(e) => error_to_http(e),
    }
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool, &state.config).await;
    (status, Json(body))
}

pub async fn summarize_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<TranscriptRequest>,
) -> impl IntoResponse {
    let (status, body) = summarize_inner(&state.pool, &state.summarizer, req).await;
    (status, Json(body))
}

pub async fn summaries_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = summaries_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn resummarize_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = resummarize_inner(&state.pool, &state.summarizer, id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a record operation error onto an HTTP status and error body.
pub fn error_to_http(err: CommLogError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        CommLogError::EmptyTranscript => StatusCode::BAD_REQUEST,
        CommLogError::NotFound(_) => StatusCode::NOT_FOUND,
        CommLogError::Database(e) => {
            tracing::error!(error = %e, "Database error while handling request");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, ErrorResponse::new(err.to_string()).into())
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
