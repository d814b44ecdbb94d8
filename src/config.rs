//! Configuration file parser for ~/.config/metagroove/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::ScrollOptions;

/// Environment variable holding the data API key. Wins over the file.
pub const API_KEY_ENV: &str = "METAGROOVE_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Process configuration. Every key is optional.
///
/// `Debug` masks `data_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; defaults to `metagroove.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Site root for the watch-page scrape.
    pub scrape_base_url: String,

    /// Root of the video data API.
    pub api_base_url: String,

    /// Data API key. `METAGROOVE_API_KEY` takes precedence, and a key
    /// stored with `credential set` takes precedence over both.
    pub data_api_key: Option<String>,

    pub cache_ttl_days: u64,

    pub request_timeout_secs: u64,

    pub rescan_interval_ms: u64,

    pub scroll: ScrollOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            scrape_base_url: "https://www.youtube.com".to_string(),
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            data_api_key: None,
            cache_ttl_days: 7,
            request_timeout_secs: 20,
            rescan_interval_ms: 2000,
            scroll: ScrollOptions::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("scrape_base_url", &self.scrape_base_url)
            .field("api_base_url", &self.api_base_url)
            .field(
                "data_api_key",
                &self.data_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("cache_ttl_days", &self.cache_ttl_days)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("rescan_interval_ms", &self.rescan_interval_ms)
            .field("scroll", &self.scroll)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "database_path",
        "scrape_base_url",
        "api_base_url",
        "data_api_key",
        "cache_ttl_days",
        "request_timeout_secs",
        "rescan_interval_ms",
        "scroll",
    ];

    const KNOWN_SCROLL_KEYS: [&'static str; 4] = ["tick_ms", "step_px", "max_ticks", "stable_ticks"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
            if let Some(toml::Value::Table(scroll)) = raw.get("scroll") {
                for key in scroll.keys() {
                    if !Self::KNOWN_SCROLL_KEYS.contains(&key.as_str()) {
                        tracing::warn!(key = %format!("scroll.{key}"), "Unknown key in config file, ignoring");
                    }
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_days.saturating_mul(24 * 60 * 60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms.max(100))
    }

    /// The configured key: environment first, then the file.
    pub fn data_api_key(&self) -> Option<SecretString> {
        self.data_api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn data_api_key_with_env(&self, env: Option<String>) -> Option<SecretString> {
        env.filter(|k| !k.trim().is_empty())
            .or_else(|| self.data_api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
