//! Application settings structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to worker
//! threads by value.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::speech::VoiceModule;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A configuration value failed validation.  Reported before any worker
/// starts; the binary exits with status 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("YouTube URL is required")]
    MissingUrl,

    #[error(
        "Invalid YouTube URL: {0}\nExpected format: https://www.youtube.com/watch?v=VIDEO_ID"
    )]
    InvalidUrl(String),

    #[error("Speech rate must be between -100 and 100 (got {0})")]
    Rate(i32),

    #[error("Speech volume must be between 0 and 100 (got {0})")]
    Volume(i32),

    #[error("Speech pitch must be between -100 and 100 (got {0})")]
    Pitch(i32),

    #[error("Max message length must be positive")]
    MaxLength,

    #[error("Queue max size must be positive")]
    QueueSize,

    /// One of the `[pipeline]` timings is zero.
    #[error("Pipeline timing `{0}` must be positive")]
    Timing(&'static str),
}

// ---------------------------------------------------------------------------
// Stream URL shapes
// ---------------------------------------------------------------------------

static STREAM_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+",
        r"^https?://youtu\.be/[\w-]+",
        r"^https?://(www\.)?youtube\.com/live/[\w-]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Check `url` against the accepted YouTube watch / short / live URL shapes.
///
/// ```
/// use yt_liveread::config::validate_stream_url;
///
/// assert!(validate_stream_url("https://www.youtube.com/watch?v=abc_123").is_ok());
/// assert!(validate_stream_url("https://youtu.be/abc-123").is_ok());
/// assert!(validate_stream_url("https://vimeo.com/123").is_err());
/// ```
pub fn validate_stream_url(url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::MissingUrl);
    }
    if STREAM_URL_PATTERNS.iter().any(|re| re.is_match(url)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Settings for the upstream live chat and message formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Live stream URL.  Normally supplied on the command line and never
    /// written back to `settings.toml`.
    #[serde(skip_serializing)]
    pub stream_url: String,
    /// Messages longer than this (in characters) are cut and end in `...`.
    pub max_message_length: usize,
    /// Prefix each message with `"<author> says: "`.
    pub include_username: bool,
    /// Netscape-format `cookies.txt` used to get past the consent page.
    pub cookies_path: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            max_message_length: 200,
            include_username: true,
            cookies_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings applied to the Speech Dispatcher connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Output module (synthesizer) Speech Dispatcher should use.
    pub module: VoiceModule,
    /// Language code, e.g. `"en"`.
    pub language: String,
    /// -100 (slow) ..= 100 (fast).
    pub rate: i32,
    /// 0 ..= 100.
    pub volume: i32,
    /// -100 (low) ..= 100 (high).
    pub pitch: i32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            module: VoiceModule::default(),
            language: "en".into(),
            rate: 0,
            volume: 100,
            pitch: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Settings for the bounded message channel between the two workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of messages waiting to be spoken.  Messages arriving
    /// while the queue is full are dropped.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Timing knobs for worker coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on every blocking wait inside the workers and the command
    /// loop; shutdown is observed within one interval.
    pub poll_interval_ms: u64,
    /// Per-worker grace period on shutdown before the thread is detached.
    pub join_timeout_ms: u64,
    /// How long to wait for the speech worker to report ready.
    pub ready_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            join_timeout_ms: 2_000,
            ready_timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use yt_liveread::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream chat and message formatting settings.
    pub chat: ChatConfig,
    /// Speech output settings.
    pub speech: SpeechConfig,
    /// Message queue settings.
    pub queue: QueueConfig,
    /// Worker coordination timings.
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (`--config`, tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.  The stream URL is never written.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every value that would otherwise fail deep inside a worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_stream_url(&self.chat.stream_url)?;

        let speech = &self.speech;
        if !(-100..=100).contains(&speech.rate) {
            return Err(ConfigError::Rate(speech.rate));
        }
        if !(0..=100).contains(&speech.volume) {
            return Err(ConfigError::Volume(speech.volume));
        }
        if !(-100..=100).contains(&speech.pitch) {
            return Err(ConfigError::Pitch(speech.pitch));
        }

        if self.chat.max_message_length < 1 {
            return Err(ConfigError::MaxLength);
        }
        if self.queue.capacity < 1 {
            return Err(ConfigError::QueueSize);
        }

        let pipeline = &self.pipeline;
        if pipeline.poll_interval_ms == 0 {
            return Err(ConfigError::Timing("poll_interval_ms"));
        }
        if pipeline.join_timeout_ms == 0 {
            return Err(ConfigError::Timing("join_timeout_ms"));
        }
        if pipeline.ready_timeout_ms == 0 {
            return Err(ConfigError::Timing("ready_timeout_ms"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
