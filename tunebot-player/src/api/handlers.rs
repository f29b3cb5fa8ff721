//! HTTP request handlers
//!
//! Each handler delegates to [`Commands`](crate::commands::Commands) and wraps
//! the resulting chat message in JSON. Command failures map to an HTTP status
//! by error kind.

use super::AppState;
use crate::commands::{render_search, CommandError, CommandResult};
use crate::error::Error;
use crate::playback::EngineSnapshot;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tunebot_common::TrackInfo;

/// Requester recorded for tracks queued without a name
const DEFAULT_REQUESTER: &str = "api";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    git_dirty: bool,
    build_timestamp: String,
    build_profile: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    message: String,
    results: Vec<TrackInfo>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
}

/// Either a free-text query or a concrete search result
#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    query: Option<String>,
    track: Option<TrackInfo>,
    requested_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: i64, // 0-100 user-facing scale
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    mode: String,
}

type ApiError = (StatusCode, Json<MessageResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        Error::NotConnected => StatusCode::CONFLICT,
        Error::NotInitialized(_) | Error::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
        Error::ResourceUnavailable { .. }
        | Error::RecommendationFailure(_)
        | Error::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: CommandError) -> ApiError {
    let status = status_for(err.error());
    if status.is_server_error() {
        warn!("Command failed: {}", err.error());
    }
    (
        status,
        Json(MessageResponse {
            message: err.message().to_string(),
        }),
    )
}

fn reply(result: CommandResult) -> ApiResult<MessageResponse> {
    result
        .map(|message| Json(MessageResponse { message }))
        .map_err(api_error)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tunebot-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        git_dirty: env!("GIT_DIRTY") == "true",
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: state.port,
    })
}

/// POST /voice/join
pub async fn join(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<MessageResponse> {
    let channel_id = req.channel_id.trim();
    if channel_id.is_empty() {
        return Err(api_error(
            Error::InvalidParameter("channel_id is required".to_string()).into(),
        ));
    }
    let session = (state.sessions)(channel_id);
    reply(state.commands.join(session).await)
}

/// POST /voice/leave
pub async fn leave(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.leave().await)
}

/// GET /search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let results = state
        .commands
        .search_results(&params.q)
        .await
        .map_err(api_error)?;
    Ok(Json(SearchResponse {
        message: render_search(&params.q, &results),
        results,
    }))
}

/// POST /playback/play
pub async fn play(
    State(state): State<AppState>,
    Json(req): Json<PlayRequest>,
) -> ApiResult<MessageResponse> {
    let requester = req
        .requested_by
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REQUESTER);

    match (req.track, req.query) {
        (Some(track), _) => reply(state.commands.play_track(track, requester).await),
        (None, Some(query)) => reply(state.commands.play(&query, requester).await),
        (None, None) => Err(api_error(
            Error::InvalidParameter("either query or track is required".to_string()).into(),
        )),
    }
}

/// POST /playback/skip
pub async fn skip(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.skip().await)
}

/// POST /playback/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.pause().await)
}

/// POST /playback/resume
pub async fn resume(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.resume().await)
}

/// POST /playback/volume
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<MessageResponse> {
    reply(state.commands.volume(req.volume).await)
}

/// POST /playback/mode
pub async fn set_mode(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> ApiResult<MessageResponse> {
    reply(state.commands.playmode(&req.mode).await)
}

/// POST /playback/shuffle
pub async fn shuffle(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.shuffle().await)
}

/// GET /playback/queue
pub async fn get_queue(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    reply(state.commands.queue().await)
}

/// GET /playback/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<EngineSnapshot> {
    state
        .commands
        .engine()
        .snapshot()
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}
