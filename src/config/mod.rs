//! Configuration module for the live chat reader.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the platform config directory, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and range checks via
//! `AppConfig::validate`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    validate_stream_url, AppConfig, ChatConfig, ConfigError, PipelineConfig, QueueConfig,
    SpeechConfig,
};
