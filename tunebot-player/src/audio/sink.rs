//! Audio sink abstraction
//!
//! A sink plays one [`AudioResource`] at a time into a subscribed voice
//! session. Lifecycle changes are reported asynchronously as [`SinkEvent`]s on
//! the channel handed to the sink at construction.

use super::resource::{AudioResource, ResourceId};
use super::session::VoiceSession;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Sink playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkStatus {
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkStatus::Idle => write!(f, "idle"),
            SinkStatus::Playing => write!(f, "playing"),
            SinkStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Asynchronous notifications from a sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Resource finished or was force-stopped
    Idle { resource: ResourceId },

    /// Resource failed while playing
    Error { resource: ResourceId, message: String },

    /// Any status transition
    StateChanged {
        resource: Option<ResourceId>,
        old: SinkStatus,
        new: SinkStatus,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Sink is not subscribed to a voice session")]
    NotSubscribed,

    #[error("Audio file missing: {0}")]
    MissingResource(PathBuf),

    #[error("Output failure: {0}")]
    Output(String),
}

/// Sending half handed to sink implementations
pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;

/// Receiving half consumed by the playback engine
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// Create the event channel connecting a sink to its engine
pub fn sink_channel() -> (SinkEventSender, SinkEventReceiver) {
    mpsc::unbounded_channel()
}

/// Single-resource audio player
///
/// Methods return immediately; completion is reported via [`SinkEvent`].
pub trait AudioSink: Send {
    /// Route output to `session`
    fn subscribe(&mut self, session: Arc<dyn VoiceSession>);

    /// Detach from the current session
    fn unsubscribe(&mut self);

    fn is_subscribed(&self) -> bool;

    /// Start playing `resource`, replacing anything currently loaded
    fn play(&mut self, resource: AudioResource) -> Result<(), SinkError>;

    /// Force-stop the loaded resource
    ///
    /// Emits `Idle` for it and returns `true`; returns `false` if nothing was
    /// loaded.
    fn stop(&mut self) -> bool;

    /// Returns `false` unless the sink was playing
    fn pause(&mut self) -> bool;

    /// Returns `false` unless the sink was paused
    fn unpause(&mut self) -> bool;

    fn status(&self) -> SinkStatus;
}
