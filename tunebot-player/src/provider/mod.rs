//! Search, recommendation, and media-fetch provider
//!
//! The engine and command layer only see [`MusicProvider`]; the shipped
//! implementation is [`PipedProvider`], which talks to a Piped-compatible
//! HTTP API.

pub mod piped;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use tunebot_common::TrackInfo;

pub use piped::PipedProvider;

/// Provider errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// `init()` has not completed
    #[error("Provider not initialized")]
    NotInitialized,

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream API returned an error status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse API response JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Track has no downloadable audio stream
    #[error("No audio stream for track {0}")]
    NoAudioStream(String),

    /// Query rejected before reaching the network
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Audio bytes as they arrive from the network
pub type AudioStream = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Source of track metadata and audio
///
/// All calls other than `init` fail with [`ProviderError::NotInitialized`]
/// until `init` has succeeded.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    async fn init(&self) -> Result<(), ProviderError>;

    async fn shutdown(&self);

    fn is_initialized(&self) -> bool;

    /// Up to `limit` playable tracks matching `query`; no match is an empty vec
    async fn search_tracks(&self, query: &str, limit: usize)
        -> Result<Vec<TrackInfo>, ProviderError>;

    /// Up to `limit` tracks related to `seed_id`
    async fn get_recommendations(
        &self,
        seed_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackInfo>, ProviderError>;

    /// Open the audio byte stream for a track
    async fn fetch_audio(&self, track_id: &str) -> Result<AudioStream, ProviderError>;
}
