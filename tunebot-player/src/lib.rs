//! # Tunebot Player Library (tunebot-player)
//!
//! Music playback engine for a voice-chat bot.
//!
//! **Purpose:** Queue tracks found through a music provider, cache their audio
//! on disk, and play them one after another into a voice session, with
//! autoplay, volume, skip, and mode controls.
//!
//! **Architecture:** a single-writer engine actor (`playback::engine`) fed by
//! the command layer (`commands`) and the HTTP API (`api`); collaborators are
//! traits (`provider::MusicProvider`, `audio::AudioSink`,
//! `audio::VoiceSession`).

pub mod api;
pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod playback;
pub mod provider;

pub use commands::{CommandError, Commands};
pub use error::{Error, Result};
pub use playback::{PlaybackEngine, StreamCache};
