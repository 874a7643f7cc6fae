use super::state::AppState;
use crate::catalog::{self, RawRecording, Recording};
use crate::error::{ValidationError, ViewerError};
use crate::health::ConnectionStatus;
use crate::session::{SessionId, SessionSnapshot};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub channel: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub channel: Option<String>,
    /// Calendar day, YYYY-MM-DD
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connection: ConnectionStatus,
    pub session: Option<SessionSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: SessionId,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: String,
    pub connection: ConnectionStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: ViewerError) -> Response {
    let status = match &e {
        ViewerError::Validation(_) => StatusCode::BAD_REQUEST,
        ViewerError::Superseded(_) => StatusCode::CONFLICT,
        ViewerError::Transport(_) | ViewerError::Negotiation(_) | ViewerError::Media(_) => {
            StatusCode::BAD_GATEWAY
        }
        ViewerError::InvalidTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn started(session_id: SessionId, message: String) -> Response {
    (
        StatusCode::OK,
        Json(StartResponse {
            session_id,
            status: "negotiating".to_string(),
            message,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /live/:channel
/// Start watching a live channel, replacing any active session
pub async fn start_live(State(state): State<AppState>, Path(channel): Path<String>) -> Response {
    info!("Live requested for channel {}", channel);

    match state.controller.start_live(&channel).await {
        Ok(id) => started(id, format!("Live channel {} negotiating", channel)),
        Err(e) => error_response(e),
    }
}

/// POST /archive
/// Replay a recording, replacing any active session
pub async fn start_archive(
    State(state): State<AppState>,
    Json(req): Json<ArchiveRequest>,
) -> Response {
    let recording = match Recording::from_raw(&RawRecording {
        channel: req.channel,
        start_time: req.start_time,
        end_time: req.end_time,
    }) {
        Ok(recording) => recording,
        Err(e) => return error_response(e.into()),
    };

    info!(
        "Playback requested for channel {} at {}",
        recording.channel(),
        recording.start_time()
    );

    match state.controller.play(&recording).await {
        Ok(id) => started(
            id,
            format!("Archive {} from {} negotiating", recording.channel(), recording.start_time()),
        ),
        Err(e) => error_response(e),
    }
}

/// POST /stop
/// Tear down the active session; succeeds even when nothing is playing
pub async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.stop().await;

    (
        StatusCode::OK,
        Json(StopResponse {
            status: "stopped".to_string(),
            connection: state.health.status(),
        }),
    )
}

/// GET /status
/// Connection badge and active session
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        connection: state.health.status(),
        session: state.controller.snapshot().await,
    })
}

/// GET /recordings?channel=&date=
/// Ordered recordings plus timeline geometry for one day
pub async fn search_recordings(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let date = match params.date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                return error_response(ValidationError::BadTimestamp(raw.to_string()).into())
            }
        },
    };

    let channel = params.channel.unwrap_or_default();
    match catalog::search(state.recordings.as_ref(), &channel, date).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
