//! Playback engine, queue, and audio cache

pub mod cache;
pub mod engine;
pub mod queue;

pub use cache::{CacheStats, StreamCache};
pub use engine::{
    EngineSettings, EngineSnapshot, PlayOutcome, PlaybackEngine, SkipOutcome, AUTOPLAY_REQUESTER,
};
pub use queue::Queue;
