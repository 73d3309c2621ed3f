//! Speech output module.
//!
//! # Architecture
//!
//! ```text
//! SpeechBackend::connect(client_name) ──▶ Box<dyn SpeechDevice>
//!                                            ├─ configure(&SpeechSettings)
//!                                            ├─ speak(text)
//!                                            ├─ cancel()
//!                                            └─ close()
//! ```
//!
//! [`SpeechBackend`] is shared with the speech worker behind an `Arc` and is
//! only asked to connect from inside the worker thread, so a device never
//! crosses threads.  [`SpeechDispatcher`] is the production backend.

pub mod dispatcher;
pub mod ssip;
#[cfg(test)]
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SpeechConfig;

pub use dispatcher::SpeechDispatcher;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors raised by a speech backend or device.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// The speech daemon could not be reached.
    #[error("speech service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the requested voice settings.
    #[error("invalid speech settings: {0}")]
    Configure(String),

    /// A single utterance was rejected.
    #[error("utterance rejected: {0}")]
    Rejected(String),

    /// Cancelling or closing the connection failed.
    #[error("failed to release speech connection: {0}")]
    Release(String),
}

// ---------------------------------------------------------------------------
// VoiceModule / Priority
// ---------------------------------------------------------------------------

/// Speech Dispatcher output modules the reader offers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceModule {
    #[default]
    EspeakNg,
    Pico,
    Festival,
}

impl VoiceModule {
    /// Module name as Speech Dispatcher knows it.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceModule::EspeakNg => "espeak-ng",
            VoiceModule::Pico => "pico",
            VoiceModule::Festival => "festival",
        }
    }
}

impl std::fmt::Display for VoiceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSIP message priorities, highest first.
///
/// Chat is spoken at [`Priority::Text`] so screen readers and other
/// higher-priority announcements interrupt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Important,
    Message,
    Text,
    Notification,
    Progress,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Important => "important",
            Priority::Message => "message",
            Priority::Text => "text",
            Priority::Notification => "notification",
            Priority::Progress => "progress",
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSettings
// ---------------------------------------------------------------------------

/// Everything applied to a device right after it connects.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub module: VoiceModule,
    pub language: String,
    pub rate: i32,
    pub volume: i32,
    pub pitch: i32,
    pub priority: Priority,
}

impl From<&SpeechConfig> for SpeechSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            module: config.module,
            language: config.language.clone(),
            rate: config.rate,
            volume: config.volume,
            pitch: config.pitch,
            priority: Priority::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open connection to a speech output service.
pub trait SpeechDevice {
    fn configure(&mut self, settings: &SpeechSettings) -> Result<(), SpeechError>;

    /// Queue `text` for speaking.  Returns once the service accepted it.
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;

    /// Drop whatever is currently being spoken or still queued.
    fn cancel(&mut self) -> Result<(), SpeechError>;

    fn close(&mut self) -> Result<(), SpeechError>;
}

/// Opens [`SpeechDevice`] connections.
///
/// Must be `Send + Sync` so it can be handed to the speech worker thread
/// behind an `Arc<dyn SpeechBackend>`.
pub trait SpeechBackend: Send + Sync {
    fn connect(&self, client_name: &str) -> Result<Box<dyn SpeechDevice>, SpeechError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechBackend>, _: Box<dyn SpeechDevice>) {}
};
