//! Playable audio resources
//!
//! An [`AudioResource`] is a cached audio file prepared for one playback.
//! It carries a [`ResourceId`] so sink events can be matched to the resource
//! that produced them, and a [`GainControl`] shared with the sink so volume
//! changes apply while the resource is playing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tunebot_common::Track;

/// Identity of one loaded resource, unique per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Live-adjustable gain (0.0-1.0), stored as `f32` bits
#[derive(Debug, Clone)]
pub struct GainControl(Arc<AtomicU32>);

impl GainControl {
    pub fn new(level: f32) -> Self {
        Self(Arc::new(AtomicU32::new(level.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }
}

/// Audio file ready to be handed to a sink
///
/// Clones share the same gain control.
#[derive(Debug, Clone)]
pub struct AudioResource {
    id: ResourceId,
    track: Track,
    path: PathBuf,
    gain: GainControl,
}

impl AudioResource {
    pub fn new(id: ResourceId, track: Track, path: PathBuf, volume: f32) -> Self {
        Self {
            id,
            track,
            path,
            gain: GainControl::new(volume),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }

    /// Nominal playback length taken from the track metadata
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.track.duration_secs())
    }
}
