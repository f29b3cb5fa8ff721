//! HTTP control API
//!
//! Exposes the chat commands as REST endpoints plus an SSE stream of
//! [`BotEvent`](tunebot_common::BotEvent)s.

pub mod handlers;
pub mod sse;

use crate::audio::VoiceSession;
use crate::commands::Commands;
use crate::error::{Error, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tunebot_common::EventBus;

/// Opens a voice session for a channel id
pub type SessionFactory = Arc<dyn Fn(&str) -> Arc<dyn VoiceSession> + Send + Sync>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub commands: Commands,
    pub events: EventBus,
    pub sessions: SessionFactory,
    /// Server port, reported by /health
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Voice channel
        .route("/voice/join", post(handlers::join))
        .route("/voice/leave", post(handlers::leave))
        // Search
        .route("/search", get(handlers::search))
        // Playback control
        .route("/playback/play", post(handlers::play))
        .route("/playback/skip", post(handlers::skip))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/resume", post(handlers::resume))
        .route("/playback/volume", post(handlers::set_volume))
        .route("/playback/mode", post(handlers::set_mode))
        .route("/playback/shuffle", post(handlers::shuffle))
        .route("/playback/queue", get(handlers::get_queue))
        .route("/playback/status", get(handlers::get_status))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    info!("HTTP API stopped");
    Ok(())
}
