//! Tunebot Player - Main entry point
//!
//! Starts the music provider, audio cache, playback engine, and the HTTP
//! control API, then serves until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunebot_common::config::default_config_path;
use tunebot_common::EventBus;
use tunebot_player::api::{self, AppState, SessionFactory};
use tunebot_player::audio::{sink_channel, LoggingSession, PacedSink, VoiceSession};
use tunebot_player::config::{self as player_config, Overrides};
use tunebot_player::playback::{EngineSettings, PlaybackEngine, StreamCache};
use tunebot_player::provider::{MusicProvider, PipedProvider};
use tunebot_player::Commands;

/// Command-line arguments for tunebot-player
#[derive(Parser, Debug)]
#[command(name = "tunebot-player")]
#[command(about = "Music playback engine for a voice-chat bot")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "TUNEBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Port for the HTTP control API
    #[arg(short, long, env = "TUNEBOT_PORT")]
    port: Option<u16>,

    /// Address for the HTTP control API
    #[arg(long, env = "TUNEBOT_BIND")]
    bind: Option<String>,

    /// Directory for cached audio
    #[arg(long, env = "TUNEBOT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Base URL of the Piped API instance
    #[arg(long, env = "TUNEBOT_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Tracing filter when RUST_LOG is unset
    #[arg(long, env = "TUNEBOT_LOG")]
    log_level: Option<String>,

    /// Leave the voice channel when the queue runs out
    #[arg(long)]
    leave_on_queue_end: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        port: args.port,
        bind_address: args.bind,
        cache_dir: args.cache_dir,
        provider_url: args.provider_url,
        log_level: args.log_level,
        leave_on_queue_end: args.leave_on_queue_end,
    };
    let config = player_config::resolve(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| player_config::log_filter(&config).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tunebot-player v{}", env!("CARGO_PKG_VERSION"));
    match args.config.or_else(default_config_path).filter(|p| p.exists()) {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using compiled defaults"),
    }

    let addr = player_config::bind_addr(&config).context("Invalid server address")?;

    // Music provider
    let provider: Arc<dyn MusicProvider> = Arc::new(PipedProvider::new(&config.provider));
    provider
        .init()
        .await
        .context("Failed to initialize music provider")?;

    // Audio cache
    let cache = Arc::new(StreamCache::new(&config.cache, Arc::clone(&provider)));
    cache
        .ensure_dir()
        .await
        .context("Failed to create cache directory")?;

    // Playback engine
    let events = EventBus::new(config.playback.event_capacity);
    let (sink_tx, sink_rx) = sink_channel();
    let engine = PlaybackEngine::spawn(
        EngineSettings::from(&config.playback),
        cache,
        Arc::clone(&provider),
        Box::new(PacedSink::new(sink_tx)),
        sink_rx,
        events.clone(),
    );
    info!("Playback engine initialized");

    let commands = Commands::new(
        engine.clone(),
        Arc::clone(&provider),
        config.playback.search_limit,
    );
    let sessions: SessionFactory =
        Arc::new(|channel_id: &str| Arc::new(LoggingSession::new(channel_id)) as Arc<dyn VoiceSession>);

    let state = AppState {
        commands,
        events,
        sessions,
        port: addr.port(),
    };

    api::run(state, addr, shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown().await.context("Engine shutdown failed")?;
    provider.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
