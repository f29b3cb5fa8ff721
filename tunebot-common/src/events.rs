//! Event types for the tunebot event system
//!
//! The playback engine publishes `BotEvent`s on an `EventBus`; the HTTP layer
//! forwards them to SSE clients, and a chat front end would turn `NowPlaying`
//! into its "now playing" message.

use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

/// Playback status as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded
    Idle,
    /// A resource is loaded and audible
    Playing,
    /// A resource is loaded but paused
    Paused,
    /// Between tracks: the next resource is being resolved
    Transitioning,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// Track selection policy applied when the queue runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Stop when the queue is exhausted
    #[default]
    Normal,
    /// Refill the queue with recommendations seeded by the last track
    Autoplay,
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayMode::Normal => write!(f, "normal"),
            PlayMode::Autoplay => write!(f, "autoplay"),
        }
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(PlayMode::Normal),
            "autoplay" => Ok(PlayMode::Autoplay),
            other => Err(format!(
                "unknown play mode \"{}\" (expected normal or autoplay)",
                other
            )),
        }
    }
}

/// Tunebot event types
///
/// Serialized with an internal `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BotEvent {
    /// Engine attached to a voice session
    SessionBound {
        session_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine left its voice session; queue was cleared
    Disconnected {
        session_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Track appended to the queue by a user
    TrackQueued {
        track: Track,
        /// 0-based queue index
        position: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A resource for this track was handed to the sink
    NowPlaying {
        track: Track,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Track could not be played and was skipped
    TrackFailed {
        track_id: String,
        title: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Autoplay appended recommendations
    AutoplayQueued {
        seed_id: String,
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue ran out; engine is idle
    QueueExhausted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sink status changed
    PlaybackStateChanged {
        old_state: PlaybackStatus,
        new_state: PlaybackStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed (0.0-1.0)
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Play mode changed
    ModeChanged {
        mode: PlayMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl BotEvent {
    /// Event name used as the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            BotEvent::SessionBound { .. } => "SessionBound",
            BotEvent::Disconnected { .. } => "Disconnected",
            BotEvent::TrackQueued { .. } => "TrackQueued",
            BotEvent::NowPlaying { .. } => "NowPlaying",
            BotEvent::TrackFailed { .. } => "TrackFailed",
            BotEvent::AutoplayQueued { .. } => "AutoplayQueued",
            BotEvent::QueueExhausted { .. } => "QueueExhausted",
            BotEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            BotEvent::VolumeChanged { .. } => "VolumeChanged",
            BotEvent::ModeChanged { .. } => "ModeChanged",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a `tokio::sync::broadcast` channel: publishing never blocks, slow
/// subscribers observe `Lagged`, and dropped subscribers clean up on their own.
///
/// # Examples
///
/// ```
/// use tunebot_common::events::{BotEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(BotEvent::QueueExhausted { timestamp: chrono::Utc::now() });
/// assert!(matches!(rx.try_recv(), Ok(BotEvent::QueueExhausted { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: BotEvent) -> Result<usize, broadcast::error::SendError<BotEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BotEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
