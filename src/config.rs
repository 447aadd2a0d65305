//! Configuration types and validation

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum staged-file size: 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Top-level library configuration
///
/// Everything is constructor-injected; the library never reads process
/// environment or global state on its own. All fields have serde defaults so
/// a partial config file deserializes cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for staged artifacts
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Maximum size in bytes a staged file may have
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Deezer ARL session token enabling full-quality track downloads.
    /// Without it, track resolves fall back to 30-second previews.
    #[serde(default)]
    pub deezer_arl: Option<String>,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Caller-side retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

/// External extractor tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit path to the yt-dlp binary; overrides PATH discovery
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Explicit path to the gallery-dl binary; overrides PATH discovery
    #[serde(default)]
    pub gallerydl_path: Option<PathBuf>,

    /// Explicit path to the deemix binary; overrides PATH discovery
    #[serde(default)]
    pub deemix_path: Option<PathBuf>,

    /// Explicit path to the ffmpeg binary used for tag embedding
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to fall back to PATH discovery when no explicit path is set
    #[serde(default = "default_search_path")]
    pub search_path: bool,

    /// Wall-clock deadline for a single tool invocation
    #[serde(default = "default_tool_timeout", with = "duration_secs")]
    pub tool_timeout: Duration,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request deadline for API and media fetches
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// User-Agent header sent on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base URL of the Deezer catalog API
    #[serde(default = "default_deezer_api_base")]
    pub deezer_api_base: String,

    /// Override for the Reddit host used for post metadata fetches. When
    /// unset, post URLs are fetched from their own (normalized) host.
    #[serde(default)]
    pub reddit_api_base: Option<String>,
}

/// Caller-side retry settings consumed by [`crate::retry::with_backoff`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay", with = "duration_secs")]
    pub initial_delay: Duration,

    /// Ceiling on the backoff delay
    #[serde(default = "default_max_delay", with = "duration_secs")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add random jitter to each delay
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("media-dl")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_search_path() -> bool {
    true
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("media-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_deezer_api_base() -> String {
    "https://api.deezer.com".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            staging_dir: default_staging_dir(),
            max_file_size: default_max_file_size(),
            deezer_arl: None,
            tools: ToolsConfig::default(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            ytdlp_path: None,
            gallerydl_path: None,
            deemix_path: None,
            ffmpeg_path: None,
            search_path: default_search_path(),
            tool_timeout: default_tool_timeout(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            deezer_api_base: default_deezer_api_base(),
            reddit_api_base: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl Config {
    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::Config {
                message: "max_file_size must be greater than zero".to_string(),
                key: Some("max_file_size".to_string()),
            });
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "staging_dir must not be empty".to_string(),
                key: Some("staging_dir".to_string()),
            });
        }
        if self.tools.tool_timeout.is_zero() {
            return Err(Error::Config {
                message: "tool_timeout must be greater than zero".to_string(),
                key: Some("tools.tool_timeout".to_string()),
            });
        }
        if self.http.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request_timeout must be greater than zero".to_string(),
                key: Some("http.request_timeout".to_string()),
            });
        }
        if self.http.deezer_api_base.is_empty() {
            return Err(Error::Config {
                message: "deezer_api_base must not be empty".to_string(),
                key: Some("http.deezer_api_base".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be at least 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}
