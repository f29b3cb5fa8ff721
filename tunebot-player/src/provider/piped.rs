//! Piped API client
//!
//! Uses a Piped-compatible instance for search (`/search`), related tracks and
//! audio stream discovery (`/streams/{id}`). Audio bytes are streamed from the
//! URL Piped reports for the highest-bitrate audio-only stream.

use super::{AudioStream, MusicProvider, ProviderError};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use tunebot_common::config::ProviderConfig;
use tunebot_common::TrackInfo;
use url::Url;

const USER_AGENT: &str = concat!("tunebot/", env!("CARGO_PKG_VERSION"));

/// Suffix YouTube appends to auto-generated artist channels
const TOPIC_SUFFIX: &str = " - Topic";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<StreamItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamItem {
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    uploader_name: Option<String>,
    duration: Option<i64>,
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<AudioStreamInfo>,
    #[serde(default)]
    related_streams: Vec<StreamItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioStreamInfo {
    url: String,
    #[serde(default)]
    bitrate: u64,
    mime_type: Option<String>,
}

/// Base that Piped's relative `/watch?v=` links are resolved against
const LINK_BASE: &str = "https://piped.invalid/";

/// Extract the video id from `/watch?v=<id>&...`
fn video_id(link: &str) -> Option<String> {
    let url = Url::parse(LINK_BASE).ok()?.join(link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, id)| id.into_owned())
        .filter(|id| !id.is_empty())
}

impl StreamItem {
    /// Convert to a playable track, dropping incomplete results
    fn into_track_info(self) -> Option<TrackInfo> {
        if self.kind.as_deref().is_some_and(|k| k != "stream") {
            return None;
        }
        let id = video_id(self.url.as_deref()?)?;
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let uploader = self.uploader_name.filter(|a| !a.trim().is_empty())?;
        let duration = self.duration.filter(|d| *d > 0)?;
        let thumbnail = self.thumbnail.filter(|t| !t.is_empty())?;

        let artist = uploader
            .strip_suffix(TOPIC_SUFFIX)
            .unwrap_or(&uploader)
            .to_string();

        Some(TrackInfo {
            id,
            title,
            artist,
            duration_secs: duration as u64,
            thumbnail,
        })
    }
}

/// Keep valid, distinct results other than `exclude`, up to `limit`
fn collect_tracks(items: Vec<StreamItem>, exclude: Option<&str>, limit: usize) -> Vec<TrackInfo> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(StreamItem::into_track_info)
        .filter(|t| Some(t.id.as_str()) != exclude)
        .filter(|t| seen.insert(t.id.clone()))
        .take(limit)
        .collect()
}

/// Highest-bitrate audio stream
fn best_audio_stream(streams: &[AudioStreamInfo]) -> Option<&AudioStreamInfo> {
    streams
        .iter()
        .filter(|s| !s.url.is_empty())
        .max_by_key(|s| s.bitrate)
}

/// Piped-backed [`MusicProvider`]
pub struct PipedProvider {
    base_url: String,
    timeout: Duration,
    client: RwLock<Option<reqwest::Client>>,
}

impl PipedProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            client: RwLock::new(None),
        }
    }

    fn client(&self) -> Result<reqwest::Client, ProviderError> {
        self.client
            .read()
            .map_err(|_| ProviderError::NotInitialized)?
            .clone()
            .ok_or(ProviderError::NotInitialized)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn streams(&self, track_id: &str) -> Result<StreamsResponse, ProviderError> {
        let client = self.client()?;
        let url = format!("{}/streams/{}", self.base_url, track_id);
        debug!(track_id = %track_id, url = %url, "Querying Piped streams");
        self.get_json(client.get(&url)).await
    }
}

#[async_trait]
impl MusicProvider for PipedProvider {
    async fn init(&self) -> Result<(), ProviderError> {
        if self.is_initialized() {
            return Ok(());
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let mut slot = self
            .client
            .write()
            .map_err(|_| ProviderError::Network("provider lock poisoned".to_string()))?;
        *slot = Some(client);
        info!("Piped provider ready ({})", self.base_url);
        Ok(())
    }

    async fn shutdown(&self) {
        if let Ok(mut slot) = self.client.write() {
            if slot.take().is_some() {
                info!("Piped provider shut down");
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.client.read().map(|c| c.is_some()).unwrap_or(false)
    }

    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackInfo>, ProviderError> {
        let client = self.client()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(ProviderError::InvalidQuery("search query is empty".to_string()));
        }

        let url = format!("{}/search", self.base_url);
        let response: SearchResponse = self
            .get_json(
                client
                    .get(&url)
                    .query(&[("q", query), ("filter", "music_songs")]),
            )
            .await?;

        let tracks = collect_tracks(response.items, None, limit);
        if tracks.is_empty() {
            debug!("No results were found for query: {:?}", query);
        }
        Ok(tracks)
    }

    async fn get_recommendations(
        &self,
        seed_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackInfo>, ProviderError> {
        let response = self.streams(seed_id).await?;
        let tracks = collect_tracks(response.related_streams, Some(seed_id), limit);
        debug!("{} recommendations for {}", tracks.len(), seed_id);
        Ok(tracks)
    }

    async fn fetch_audio(&self, track_id: &str) -> Result<AudioStream, ProviderError> {
        let client = self.client()?;
        let response = self.streams(track_id).await?;
        let stream = best_audio_stream(&response.audio_streams)
            .ok_or_else(|| ProviderError::NoAudioStream(track_id.to_string()))?;

        debug!(
            track_id = %track_id,
            bitrate = stream.bitrate,
            mime = stream.mime_type.as_deref().unwrap_or("unknown"),
            "Selected audio stream"
        );

        let media = client
            .get(&stream.url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = media.status();
        if !status.is_success() {
            warn!("Audio fetch for {} returned {}", track_id, status);
            return Err(ProviderError::Api(status.as_u16(), status.to_string()));
        }

        Ok(media
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ProviderError::Network(e.to_string())))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(url: &str, duration: i64) -> serde_json::Value {
        json!({
            "url": url,
            "type": "stream",
            "title": "Song",
            "uploaderName": "Band - Topic",
            "duration": duration,
            "thumbnail": "https://img.example/t.jpg"
        })
    }

    #[test]
    fn test_video_id_extraction() {
        assert_eq!(video_id("/watch?v=abc123").as_deref(), Some("abc123"));
        assert_eq!(video_id("/watch?list=x&v=abc123&t=5").as_deref(), Some("abc123"));
        assert_eq!(video_id("/watch?v="), None);
        assert_eq!(video_id("/channel/xyz"), None);
    }

    #[test]
    fn test_video_id_drops_fragment_and_decodes() {
        assert_eq!(video_id("/watch?v=abc123#t=30").as_deref(), Some("abc123"));
        assert_eq!(video_id("/watch?v=abc%2D123").as_deref(), Some("abc-123"));
        assert_eq!(
            video_id("https://piped.example/watch?v=xyz&t=5").as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn test_search_response_filters_invalid_results() {
        let body = json!({
            "items": [
                item("/watch?v=good", 200),
                item("/watch?v=live", -1),
                { "url": "/channel/abc", "type": "channel", "name": "Band" },
                { "url": "/watch?v=untitled", "type": "stream", "duration": 10 },
                item("/watch?v=good", 200),
            ]
        });
        let parsed: SearchResponse = serde_json::from_value(body).unwrap();

        let tracks = collect_tracks(parsed.items, None, 5);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "good");
        assert_eq!(tracks[0].artist, "Band");
        assert_eq!(tracks[0].duration_secs, 200);
    }

    #[test]
    fn test_recommendations_exclude_seed_and_respect_limit() {
        let items: Vec<StreamItem> = (0..6)
            .map(|i| serde_json::from_value(item(&format!("/watch?v=id{}", i), 100)).unwrap())
            .collect();

        let tracks = collect_tracks(items, Some("id0"), 3);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["id1", "id2", "id3"]);
    }

    #[test]
    fn test_best_audio_stream_prefers_bitrate() {
        let body = json!({
            "audioStreams": [
                { "url": "https://cdn/low", "bitrate": 48000, "mimeType": "audio/webm" },
                { "url": "https://cdn/high", "bitrate": 160000, "mimeType": "audio/webm" },
                { "url": "", "bitrate": 320000 }
            ],
            "relatedStreams": []
        });
        let parsed: StreamsResponse = serde_json::from_value(body).unwrap();
        let best = best_audio_stream(&parsed.audio_streams).unwrap();
        assert_eq!(best.url, "https://cdn/high");
    }

    #[tokio::test]
    async fn test_calls_before_init_fail() {
        let provider = PipedProvider::new(&ProviderConfig::default());
        assert!(!provider.is_initialized());

        let err = provider.search_tracks("song", 5).await.unwrap_err();
        assert_eq!(err, ProviderError::NotInitialized);
        assert!(provider.fetch_audio("abc").await.is_err());
    }

    #[tokio::test]
    async fn test_init_and_shutdown() {
        let provider = PipedProvider::new(&ProviderConfig::default());
        provider.init().await.unwrap();
        assert!(provider.is_initialized());

        let err = provider.search_tracks("   ", 5).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidQuery(_)));

        provider.shutdown().await;
        assert!(!provider.is_initialized());
    }
}
