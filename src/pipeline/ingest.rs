//! Ingestion worker — live chat → formatted text → [`MessageChannel`].
//!
//! # Flow
//!
//! ```text
//! Connecting ─ load cookies, ChatSource::connect ─┬─ Err → Failed (sets shutdown)
//!                                                 └─ Ok  → Streaming
//! Streaming  ─ loop {
//!                shutdown?            → Stopped
//!                next_message()
//!                  Ok(None)           → Stopped (end of stream)
//!                  Ok(Some(msg))      → format → push (drop when full)
//!                  Err(per-item)      → skip
//!                  Err(other)         → Stopped
//!                panic                → Stopped
//!              }
//! ```
//!
//! A failed connection is never retried: disabled chat, an ended stream or
//! bad cookies do not fix themselves.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::{ChatError, ChatSource, ChatStream, Credential, MessageFormatter};
use crate::config::ChatConfig;

use super::channel::{MessageChannel, PushOutcome};
use super::signals::ControlSignals;
use super::state::{IngestState, StateCell};
use super::worker::panic_message;

const WORKER: &str = "chat-reader";

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Messages pulled from the stream.
    pub received: u64,
    /// Messages pushed onto the queue.
    pub queued: u64,
    /// Messages discarded because the queue was full.
    pub dropped: u64,
    /// Messages filtered out (non-text, empty, malformed).
    pub skipped: u64,
}

/// Producer half of the pipeline.
pub struct IngestionWorker {
    source: Arc<dyn ChatSource>,
    target: String,
    cookies_path: Option<PathBuf>,
    formatter: MessageFormatter,
    channel: MessageChannel,
    signals: Arc<ControlSignals>,
    state: StateCell<IngestState>,
}

impl IngestionWorker {
    pub fn new(
        source: Arc<dyn ChatSource>,
        config: &ChatConfig,
        channel: MessageChannel,
        signals: Arc<ControlSignals>,
    ) -> Self {
        Self {
            source,
            target: config.stream_url.clone(),
            cookies_path: config.cookies_path.clone(),
            formatter: MessageFormatter::from_config(config),
            channel,
            signals,
            state: StateCell::new(IngestState::Connecting),
        }
    }

    /// Observable state, shared with whoever spawned the worker.
    pub fn state(&self) -> StateCell<IngestState> {
        self.state.clone()
    }

    /// Run to completion on the calling thread.
    pub fn run(self) -> IngestStats {
        let connected = panic::catch_unwind(AssertUnwindSafe(|| self.connect()))
            .unwrap_or_else(|payload| {
                Err(ChatError::Request(format!(
                    "connect panicked: {}",
                    panic_message(&payload)
                )))
            });
        let mut stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("{WORKER}: error connecting to chat: {e}");
                self.log_connect_hints(&e);
                self.state.set(WORKER, IngestState::Failed);
                self.signals.shutdown.set();
                return IngestStats::default();
            }
        };

        log::info!("{WORKER}: connected to YouTube chat successfully");
        self.state.set(WORKER, IngestState::Streaming);

        let mut stats = IngestStats::default();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| {
            self.stream_messages(stream.as_mut(), &mut stats)
        })) {
            log::error!("{WORKER}: chat reader failed: {}", panic_message(&payload));
        }

        if stats.queued == 0 {
            log::warn!(
                "{WORKER}: no messages received. The chat might be very quiet or disabled."
            );
        }
        log::info!(
            "{WORKER}: stopped (received {}, queued {}, dropped {}, skipped {})",
            stats.received,
            stats.queued,
            stats.dropped,
            stats.skipped
        );
        self.state.set(WORKER, IngestState::Stopped);
        stats
    }

    fn connect(&self) -> Result<Box<dyn ChatStream>, ChatError> {
        log::info!("{WORKER}: connecting to YouTube chat: {}", self.target);

        let credential = match &self.cookies_path {
            Some(path) => {
                let credential = Credential::from_netscape_file(path)?;
                log::info!(
                    "{WORKER}: using {} cookies from: {}",
                    credential.len(),
                    path.display()
                );
                Some(credential)
            }
            None => None,
        };

        self.source.connect(
            &self.target,
            credential.as_ref(),
            Arc::clone(&self.signals.shutdown),
        )
    }

    /// Counts go into `stats` as they happen, so a panic mid-stream keeps
    /// what was counted so far.
    fn stream_messages(&self, stream: &mut dyn ChatStream, stats: &mut IngestStats) {
        while !self.signals.shutdown.is_set() {
            let message = match stream.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => {
                    log::info!("{WORKER}: chat stream ended");
                    break;
                }
                Err(e) if e.is_per_item() => {
                    log::warn!("{WORKER}: skipping message: {e}");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("{WORKER}: chat reader stopped due to error: {e}");
                    break;
                }
            };
            stats.received += 1;

            let Some(text) = self.formatter.format(&message) else {
                stats.skipped += 1;
                continue;
            };

            match self.channel.push(text) {
                PushOutcome::Queued => {
                    stats.queued += 1;
                    if stats.queued == 1 {
                        log::info!("{WORKER}: receiving messages... (first message received)");
                    }
                }
                PushOutcome::Dropped => {
                    stats.dropped += 1;
                    log::debug!(
                        "{WORKER}: queue full ({} messages), message dropped",
                        self.channel.capacity()
                    );
                }
            }
        }
    }

    fn log_connect_hints(&self, error: &ChatError) {
        match error {
            ChatError::Parse(_) if self.cookies_path.is_none() => {
                log::error!("This is often caused by YouTube's cookie consent page.");
                log::error!("Solution: export cookies from your browser and use --cookies");
                log::error!("  1. Install a browser extension like 'Get cookies.txt LOCALLY'");
                log::error!("  2. Visit youtube.com and accept cookies");
                log::error!("  3. Export cookies to a file (cookies.txt)");
                log::error!("  4. Run: yt-liveread URL --cookies cookies.txt");
            }
            ChatError::Parse(_) => {
                log::error!("Cookie file was provided but parsing still failed. Possible reasons:");
                log::error!("  - The stream might not be live yet (check if it's 'upcoming')");
                log::error!("  - The stream might have ended");
                log::error!("  - Chat might be disabled for this stream");
                log::error!("  - The cookies might be expired or invalid");
            }
            ChatError::ChatUnavailable(_) => {
                log::error!("This stream does not have chat available:");
                log::error!("  - Chat might be disabled by the streamer");
                log::error!("  - The video might not be a livestream");
            }
            ChatError::Credential(_) => {
                log::error!("Check that the --cookies path points to a Netscape cookies.txt export");
            }
            _ => {
                log::error!("Please check that the URL is correct and the stream is live");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
