//! HTTP server and routes.
//!
//! One query endpoint: a song's status is always a 200 for any known state
//! (a failed job is data, not a transport error); 404 means the song id
//! does not exist, 400 a malformed id, 500 an unhandled collaborator
//! failure.

use crate::generation::GenerationStatusService;
use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationStatusService>,
}

pub fn make_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/songs/{id}/status", get(song_status_handler))
        .route(
            "/v1/songs/by-slug/{slug}/status",
            get(song_status_by_slug_handler),
        )
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Malformed (non-numeric) ids are rejected by the Path extractor with a
// 400 before this body runs, so no I/O happens for them.
async fn song_status_handler(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
) -> Response {
    let result = state.service.clone().song_status(song_id).await;
    status_result_response(result, &song_id.to_string())
}

async fn song_status_by_slug_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let result = state.service.clone().song_status_by_slug(&slug).await;
    status_result_response(result, &slug)
}

fn status_result_response(
    result: Result<Option<crate::generation::StatusResponse>>,
    song_ref: &str,
) -> Response {
    match result {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "song not found" })),
        )
            .into_response(),
        Err(e) => {
            error!(song = %song_ref, "Status query failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

/// Bind and serve until the shutdown token fires.
pub async fn run_server(
    service: Arc<GenerationStatusService>,
    port: u16,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let state = AppState { service };
    let router = make_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on port {}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    Ok(())
}
