//! tunebot-player specific configuration
//!
//! Layers command-line / environment overrides on top of the TOML file
//! resolved by `tunebot_common::config`.

use crate::error::Result;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tunebot_common::config::TomlConfig;

/// Tracing filter used when neither `RUST_LOG` nor `log_level` is set
pub const DEFAULT_LOG_FILTER: &str = "tunebot_player=info,tower_http=info";

/// Values supplied on the command line or via environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub provider_url: Option<String>,
    pub log_level: Option<String>,
    pub leave_on_queue_end: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut TomlConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind_address {
            config.server.bind_address = bind;
        }
        if let Some(dir) = self.cache_dir {
            config.cache.dir = Some(dir);
        }
        if let Some(url) = self.provider_url {
            config.provider.base_url = url;
        }
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        if self.leave_on_queue_end {
            config.playback.leave_on_queue_end = true;
        }
    }
}

/// Load the config file (or defaults) and apply overrides
pub fn resolve(explicit: Option<&Path>, overrides: Overrides) -> Result<TomlConfig> {
    let mut config = TomlConfig::load_or_default(explicit)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Tracing filter directive from config
pub fn log_filter(config: &TomlConfig) -> String {
    config
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Socket address the HTTP API binds to
pub fn bind_addr(config: &TomlConfig) -> Result<SocketAddr> {
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    addr.parse().map_err(|e| {
        crate::Error::Config(format!("invalid bind address {}: {}", addr, e))
    })
}
