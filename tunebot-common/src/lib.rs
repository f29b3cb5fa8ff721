//! # Tunebot Common Library
//!
//! Shared code for the tunebot workspace:
//! - Track value types (`Track`, `TrackInfo`)
//! - Event types (`BotEvent`) and the broadcast `EventBus`
//! - TOML configuration loading and resolution
//! - Time formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod track;

pub use error::{Error, Result};
pub use events::{BotEvent, EventBus};
pub use track::{Track, TrackInfo};
