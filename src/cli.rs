//! Command-line surface.
//!
//! Every tuning flag is optional: when absent, the value from
//! `settings.toml` (or the built-in default) is kept.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use crate::speech::VoiceModule;

const AFTER_HELP: &str = "\
Examples:
  yt-liveread \"https://www.youtube.com/watch?v=VIDEO_ID\"
  yt-liveread URL --voice pico --rate 10
  yt-liveread URL --no-username --max-length 150

Controls (while running):
  p - Pause/Resume speech
  q - Quit application";

/// Read YouTube live chat messages aloud using text-to-speech.
#[derive(Debug, Parser)]
#[command(name = "yt-liveread", version, about, after_help = AFTER_HELP)]
pub struct Cli {
    /// YouTube live stream URL
    pub url: String,

    /// TTS voice engine [default: espeak-ng]
    #[arg(long, value_enum)]
    pub voice: Option<VoiceModule>,

    /// Speech rate from -100 (slow) to 100 (fast) [default: 0]
    #[arg(long, allow_negative_numbers = true)]
    pub rate: Option<i32>,

    /// Volume from 0 to 100 [default: 100]
    #[arg(long)]
    pub volume: Option<i32>,

    /// Voice pitch from -100 (low) to 100 (high) [default: 0]
    #[arg(long, allow_negative_numbers = true)]
    pub pitch: Option<i32>,

    /// Maximum message length to speak [default: 200]
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Skip reading usernames, only read message text
    #[arg(long)]
    pub no_username: bool,

    /// TTS language code [default: en]
    #[arg(long)]
    pub language: Option<String>,

    /// Maximum message queue size [default: 50]
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// Path to cookies file (Netscape format) to bypass YouTube consent page
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective settings (without the URL) back to the settings file
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        config.chat.stream_url = self.url.clone();

        if let Some(voice) = self.voice {
            config.speech.module = voice;
        }
        if let Some(rate) = self.rate {
            config.speech.rate = rate;
        }
        if let Some(volume) = self.volume {
            config.speech.volume = volume;
        }
        if let Some(pitch) = self.pitch {
            config.speech.pitch = pitch;
        }
        if let Some(language) = &self.language {
            config.speech.language = language.clone();
        }
        if let Some(max_length) = self.max_length {
            config.chat.max_message_length = max_length;
        }
        if self.no_username {
            config.chat.include_username = false;
        }
        if let Some(capacity) = self.queue_size {
            config.queue.capacity = capacity;
        }
        if let Some(cookies) = &self.cookies {
            config.chat.cookies_path = Some(cookies.clone());
        }
    }
}
