//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable (via clap `env` fallbacks in the binary)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the loader logs a warning and
//! continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config/cache directories
const APP_DIR: &str = "tunebot";

/// Config file name inside the platform config directory
const CONFIG_FILE: &str = "config.toml";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub playback: PlaybackConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
}

/// HTTP control API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5750,
        }
    }
}

/// Playback engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0.0-1.0)
    pub default_volume: f32,
    /// Recommendations requested per autoplay refill
    pub autoplay_limit: usize,
    /// Results returned by a search
    pub search_limit: usize,
    /// Tear down the voice session when the queue runs out
    pub leave_on_queue_end: bool,
    /// Event bus capacity per subscriber
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.05,
            autoplay_limit: 10,
            search_limit: 5,
            leave_on_queue_end: false,
            event_capacity: 256,
        }
    }
}

/// Stream cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory; `None` means the platform cache directory
    pub dir: Option<PathBuf>,
    /// File name prefix (`<prefix>-<id>.<extension>`)
    pub prefix: String,
    /// File extension without the dot
    pub extension: String,
    /// Size cap in bytes; `None` keeps every download forever
    pub max_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "track".to_string(),
            extension: "webm".to_string(),
            max_bytes: None,
        }
    }
}

impl CacheConfig {
    /// Configured directory, or the platform default
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Search / media provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of a Piped-compatible API instance
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pipedapi.kavin.rocks".to_string(),
            timeout_secs: 20,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration with graceful fallback
    ///
    /// An explicitly requested file must exist. Without one, the platform
    /// default path is tried; if it does not exist, compiled defaults are used.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let volume = self.playback.default_volume;
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(Error::Config(format!(
                "playback.default_volume must be within 0.0-1.0, got {}",
                volume
            )));
        }
        if self.playback.autoplay_limit == 0 {
            return Err(Error::Config("playback.autoplay_limit must be > 0".to_string()));
        }
        if self.playback.search_limit == 0 {
            return Err(Error::Config("playback.search_limit must be > 0".to_string()));
        }
        if self.playback.event_capacity == 0 {
            return Err(Error::Config("playback.event_capacity must be > 0".to_string()));
        }
        if self.cache.prefix.is_empty() || self.cache.prefix.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "cache.prefix must be a non-empty file name fragment, got {:?}",
                self.cache.prefix
            )));
        }
        if self.cache.extension.is_empty() || self.cache.extension.contains(['/', '\\', '.']) {
            return Err(Error::Config(format!(
                "cache.extension must be a bare extension, got {:?}",
                self.cache.extension
            )));
        }
        if self.provider.base_url.is_empty() {
            return Err(Error::Config("provider.base_url must be set".to_string()));
        }
        Ok(())
    }
}

/// Platform config file location (`<config_dir>/tunebot/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Platform cache directory for downloaded audio
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./tunebot_cache"))
}
