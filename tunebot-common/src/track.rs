//! Track value types
//!
//! `TrackInfo` is what a provider hands back from a search or a recommendation
//! lookup. A `Track` is a `TrackInfo` that somebody asked for: it additionally
//! records the requester and is what the playback queue holds.

use crate::human_time::format_clock;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side description of a playable item (no requester yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Opaque provider identifier; also the cache key for the audio file
    pub id: String,
    /// Track title
    pub title: String,
    /// Artist credit (multiple artists already joined)
    pub artist: String,
    /// Length in seconds
    pub duration_secs: u64,
    /// Thumbnail URL
    pub thumbnail: String,
}

/// Immutable queued track
///
/// Fields are private so a constructed track can never change; clone it to
/// share between the queue, the engine and event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord")]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    duration_secs: u64,
    thumbnail: String,
    requested_by: String,
}

/// Serialized shape of a [`Track`]; decoding goes through [`Track::new`]
#[derive(Deserialize)]
struct TrackRecord {
    #[serde(flatten)]
    info: TrackInfo,
    requested_by: String,
}

impl TryFrom<TrackRecord> for Track {
    type Error = Error;

    fn try_from(record: TrackRecord) -> Result<Self> {
        Track::new(record.info, record.requested_by)
    }
}

impl Track {
    /// Create a track from provider info and the requesting user
    ///
    /// Fails with `Error::InvalidInput` when the id is empty, since the id is
    /// what the stream cache keys on.
    pub fn new(info: TrackInfo, requested_by: impl Into<String>) -> Result<Self> {
        if info.id.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "track \"{}\" has an empty id",
                info.title
            )));
        }

        Ok(Self {
            id: info.id,
            title: info.title,
            artist: info.artist,
            duration_secs: info.duration_secs,
            thumbnail: info.thumbnail,
            requested_by: requested_by.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    /// Length as `M:SS`
    pub fn formatted_duration(&self) -> String {
        format_clock(self.duration_secs)
    }

    /// Provider info without the requester
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            duration_secs: self.duration_secs,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

/// One-line chat rendering: `**Artist** - Title `M:SS``
impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**{}** - {} `{}`",
            self.artist,
            self.title,
            self.formatted_duration()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, duration_secs: u64) -> TrackInfo {
        TrackInfo {
            id: id.to_string(),
            title: "Song 2".to_string(),
            artist: "Blur".to_string(),
            duration_secs,
            thumbnail: "https://img.example/1.jpg".to_string(),
        }
    }

    #[test]
    fn test_new_keeps_fields() {
        let track = Track::new(info("abc123", 122), "alice").unwrap();

        assert_eq!(track.id(), "abc123");
        assert_eq!(track.title(), "Song 2");
        assert_eq!(track.artist(), "Blur");
        assert_eq!(track.duration_secs(), 122);
        assert_eq!(track.requested_by(), "alice");
        assert_eq!(track.info(), info("abc123", 122));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(matches!(
            Track::new(info("", 10), "alice"),
            Err(Error::InvalidInput(_))
        ));
        assert!(Track::new(info("   ", 10), "alice").is_err());
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let track = Track::new(info("abc123", 122), "alice").unwrap();
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["requested_by"], "alice");
        assert_eq!(serde_json::from_value::<Track>(json).unwrap(), track);

        let empty = serde_json::json!({
            "id": "",
            "title": "Song 2",
            "artist": "Blur",
            "duration_secs": 10,
            "thumbnail": "",
            "requested_by": "alice"
        });
        let err = serde_json::from_value::<Track>(empty).unwrap_err();
        assert!(err.to_string().contains("empty id"));
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(Track::new(info("a", 122), "x").unwrap().formatted_duration(), "2:02");
        assert_eq!(Track::new(info("a", 0), "x").unwrap().formatted_duration(), "0:00");
        assert_eq!(Track::new(info("a", 59), "x").unwrap().formatted_duration(), "0:59");
    }

    #[test]
    fn test_display() {
        let track = Track::new(info("a", 122), "alice").unwrap();
        assert_eq!(track.to_string(), "**Blur** - Song 2 `2:02`");
    }
}
