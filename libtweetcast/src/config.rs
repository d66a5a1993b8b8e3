//! Configuration management for Tweetcast
//!
//! Everything except the API secrets lives in an optional TOML file. Every
//! field has a default, so a missing file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Chunked media upload endpoint (INIT/APPEND/FINALIZE/STATUS)
    pub upload_url: String,
    /// Post creation endpoint
    pub tweet_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://upload.twitter.com/1.1/media/upload.json".to_string(),
            tweet_url: "https://api.twitter.com/2/tweets".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// APPEND chunk size for video, in bytes
    pub chunk_size: usize,
    /// Poll interval when the server gives no `check_after_secs`
    pub default_poll_interval_secs: u64,
    /// Upper bound on a server-suggested poll interval
    pub max_poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    /// Wall-clock bound on STATUS polling, measured from the first poll
    pub max_processing_secs: u64,
    /// Where downloaded and uploaded media is staged
    pub staging_dir: Option<String>,
    pub max_image_bytes: u64,
    pub max_gif_bytes: u64,
    pub max_video_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5 * MIB as usize,
            default_poll_interval_secs: 2,
            max_poll_interval_secs: 30,
            max_poll_attempts: 10,
            max_processing_secs: 300,
            staging_dir: None,
            max_image_bytes: 5 * MIB,
            max_gif_bytes: 15 * MIB,
            max_video_bytes: 512 * MIB,
        }
    }
}

impl UploadConfig {
    /// Resolve the staging directory, expanding `~` and env vars
    pub fn staging_path(&self) -> Result<PathBuf> {
        match &self.staging_dir {
            Some(dir) => {
                let expanded = shellexpand::full(dir).map_err(|e| {
                    ConfigError::MissingField(format!("upload.staging_dir ({})", e))
                })?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => Ok(std::env::temp_dir().join("tweetcast")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt when the API rate-limits us
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Ceiling applied to a server `retry-after` hint
    pub max_retry_after_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_retry_after_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            body_limit_bytes: 600 * MIB as usize,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// An explicit `TWEETCAST_CONFIG` path must exist; the XDG default may be
    /// absent, in which case built-in defaults are used.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("TWEETCAST_CONFIG") {
            let path = PathBuf::from(shellexpand::tilde(&path).to_string());
            return Self::load_from_path(&path);
        }

        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tweetcast").join("config.toml"))
}
