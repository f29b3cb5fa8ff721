//! Error types for tunebot-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use crate::audio::SinkError;
use crate::provider::ProviderError;
use thiserror::Error;

/// Main error type for tunebot-player
#[derive(Error, Debug)]
pub enum Error {
    /// Audio for a track could not be fetched or cached
    #[error("Resource unavailable for track {track_id}: {reason}")]
    ResourceUnavailable { track_id: String, reason: String },

    /// A collaborator was used before `init()`
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Out-of-range or malformed argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Autoplay could not fetch recommendations
    #[error("Recommendation lookup failed: {0}")]
    RecommendationFailure(String),

    /// Operation needs a bound voice session
    #[error("Not connected to a voice channel")]
    NotConnected,

    /// The engine actor has exited
    #[error("Playback engine is not running")]
    EngineStopped,

    /// Audio sink errors
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Search / media provider errors
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotInitialized => Error::NotInitialized("music provider".to_string()),
            ProviderError::InvalidQuery(msg) => Error::InvalidParameter(msg),
            other => Error::Provider(other),
        }
    }
}

impl From<SinkError> for Error {
    fn from(err: SinkError) -> Self {
        Error::Sink(err.to_string())
    }
}

impl From<tunebot_common::Error> for Error {
    fn from(err: tunebot_common::Error) -> Self {
        match err {
            tunebot_common::Error::InvalidInput(msg) => Error::InvalidParameter(msg),
            tunebot_common::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using tunebot-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_initialized_maps_to_not_initialized() {
        let err: Error = ProviderError::NotInitialized.into();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn test_invalid_query_maps_to_invalid_parameter() {
        let err: Error = ProviderError::InvalidQuery("empty".to_string()).into();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_common_invalid_input_maps_to_invalid_parameter() {
        let err: Error = tunebot_common::Error::InvalidInput("id".to_string()).into();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg == "id"));
    }

    #[test]
    fn test_resource_unavailable_names_track() {
        let err = Error::ResourceUnavailable {
            track_id: "abc".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Resource unavailable for track abc: timeout");
    }
}
