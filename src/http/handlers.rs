use super::state::AppState;
use crate::error::VoiceError;
use crate::session::SessionSnapshot;
use crate::transcript::TranscriptEntry;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub status: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start the voice session
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP request to start session");

    match state.session.start().await {
        Ok(()) => {
            let snapshot = state.session.snapshot().await;
            (
                StatusCode::OK,
                Json(StartSessionResponse {
                    session_id: snapshot.session_id,
                    status: "connected".to_string(),
                    message: "Voice session started".to_string(),
                }),
            )
                .into_response()
        }
        Err(VoiceError::AlreadyActive) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "A voice session is already active".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to start session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/stop
/// Stop the voice session (no-op if nothing is active)
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP request to stop session");

    state.session.stop().await;
    let snapshot = state.session.snapshot().await;

    (
        StatusCode::OK,
        Json(StopSessionResponse {
            status: "stopped".to_string(),
            snapshot,
        }),
    )
        .into_response()
}

/// GET /session/status
/// Current state, agent-speaking flag, and last error
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.session.snapshot().await;
    (StatusCode::OK, Json(snapshot)).into_response()
}

/// GET /session/transcript
/// Ordered transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript: Vec<TranscriptEntry> = state.session.transcript().await;
    (StatusCode::OK, Json(transcript)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
