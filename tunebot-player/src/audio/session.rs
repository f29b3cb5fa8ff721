//! Voice session handles
//!
//! A voice session is the connection to one voice channel. The engine binds
//! exactly one session at a time and destroys it on disconnect.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Connection to a voice channel
pub trait VoiceSession: Send + Sync + fmt::Debug {
    /// Channel identifier
    fn id(&self) -> &str;

    /// Signal whether audio is currently being transmitted
    fn set_speaking(&self, speaking: bool);

    /// Tear down the connection; further use is a no-op
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

/// Session that only logs what a real voice connection would do
#[derive(Debug)]
pub struct LoggingSession {
    id: String,
    speaking: AtomicBool,
    destroyed: AtomicBool,
}

impl LoggingSession {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        info!("Opened voice session {}", id);
        Self {
            id,
            speaking: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

impl VoiceSession for LoggingSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_speaking(&self, speaking: bool) {
        if self.is_destroyed() {
            return;
        }
        if self.speaking.swap(speaking, Ordering::SeqCst) != speaking {
            debug!("Session {} speaking={}", self.id, speaking);
        }
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.speaking.store(false, Ordering::SeqCst);
            info!("Destroyed voice session {}", self.id);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
