//! Status snapshot

use super::core::EngineCore;
use crate::playback::cache::CacheStats;
use serde::Serialize;
use tunebot_common::events::{PlayMode, PlaybackStatus};
use tunebot_common::Track;

/// Point-in-time view of engine state
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub status: PlaybackStatus,
    /// 0.0-1.0
    pub volume: f32,
    pub mode: PlayMode,
    pub session_id: Option<String>,
    pub current: Option<Track>,
    pub queue_len: usize,
    pub cursor: usize,
    pub upcoming: usize,
    pub cache: CacheStats,
}

impl EngineCore {
    pub(super) fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            status: self.status(),
            volume: self.volume,
            mode: self.mode,
            session_id: self.session.as_ref().map(|s| s.id().to_string()),
            current: self.queue.current().cloned(),
            queue_len: self.queue.len(),
            cursor: self.queue.cursor(),
            upcoming: self.queue.upcoming().len(),
            cache: self.cache.stats(),
        }
    }
}
