//! Orchestrator — owns the signals and the queue, runs both workers and the
//! operator command loop.
//!
//! # Lifecycle
//!
//! ```text
//! new(config)        validate → ConfigError before any thread exists
//! run(input, output)
//!   ├─ spawn speech worker, wait for consumer_ready (bounded)
//!   │    └─ speech Failed → shutdown, Err(SpeechUnavailable)
//!   ├─ spawn ingestion worker
//!   ├─ command loop: p / q / blank / unknown, EOF, shutdown from elsewhere,
//!   │    or the speech worker exiting (→ Err(SpeechUnavailable))
//!   ├─ set shutdown (always)
//!   └─ join each worker with its own timeout; stragglers are detached
//! ```

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use thiserror::Error;

use crate::chat::ChatSource;
use crate::config::{AppConfig, ConfigError};
use crate::speech::{SpeechBackend, SpeechSettings};

use super::channel::MessageChannel;
use super::command::OperatorCommand;
use super::ingest::IngestionWorker;
use super::signals::ControlSignals;
use super::speaker::{Echo, SpeechWorker};
use super::state::{IngestState, SpeechState};
use super::worker::WorkerHandle;

const RULE: &str = "==================================================";

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Reasons a run ends unsuccessfully.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start {worker} thread: {source}")]
    Spawn {
        worker: &'static str,
        source: io::Error,
    },

    /// The speech worker could not set up its device.
    #[error("speech output is unavailable")]
    SpeechUnavailable,

    /// The ingestion worker could not open the chat.
    #[error("live chat is unavailable")]
    ChatUnavailable,

    /// Reading operator input failed.
    #[error("operator input failed: {0}")]
    Console(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one reading session from start to shutdown.
///
/// ```rust,no_run
/// use std::io::{stdin, stdout, BufReader};
/// use std::sync::Arc;
/// use yt_liveread::chat::YouTubeChat;
/// use yt_liveread::config::AppConfig;
/// use yt_liveread::pipeline::Orchestrator;
/// use yt_liveread::speech::SpeechDispatcher;
///
/// let mut config = AppConfig::default();
/// config.chat.stream_url = "https://www.youtube.com/watch?v=VIDEO_ID".into();
///
/// let orchestrator = Orchestrator::new(
///     config,
///     Arc::new(YouTubeChat::new()),
///     Arc::new(SpeechDispatcher::new()),
/// )
/// .unwrap();
/// orchestrator.run(BufReader::new(stdin()), stdout()).unwrap();
/// ```
pub struct Orchestrator {
    config: AppConfig,
    source: Arc<dyn ChatSource>,
    speech: Arc<dyn SpeechBackend>,
    signals: Arc<ControlSignals>,
    channel: MessageChannel,
}

impl Orchestrator {
    /// Validate `config` and build the signals and queue.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Config`] when any setting is out of range.
    pub fn new(
        config: AppConfig,
        source: Arc<dyn ChatSource>,
        speech: Arc<dyn SpeechBackend>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let channel = MessageChannel::new(config.queue.capacity);

        Ok(Self {
            config,
            source,
            speech,
            signals: Arc::new(ControlSignals::new()),
            channel,
        })
    }

    /// The session's control signals (for the interrupt handler).
    pub fn signals(&self) -> Arc<ControlSignals> {
        Arc::clone(&self.signals)
    }

    /// Run the session until the operator quits, input ends, or a worker
    /// requests shutdown.  Both workers are stopped before this returns.
    pub fn run<R, W>(self, input: R, output: W) -> Result<(), PipelineError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let out: Echo = Arc::new(Mutex::new(output));
        let pipeline = &self.config.pipeline;

        say(&out, "");
        say(&out, "YouTube Live Chat TTS Reader");
        say(&out, RULE);
        say(&out, format!("Stream: {}", self.config.chat.stream_url));
        say(&out, format!("Voice: {}", self.config.speech.module));
        say(&out, RULE);

        // ── Speech worker first, so nothing is queued without a consumer ──
        let speech_worker = SpeechWorker::new(
            Arc::clone(&self.speech),
            SpeechSettings::from(&self.config.speech),
            self.channel.clone(),
            Arc::clone(&self.signals),
            pipeline.poll_interval(),
        )
        .with_echo(Arc::clone(&out));
        let speech_state = speech_worker.state();
        let speaker = WorkerHandle::spawn("speech-worker", move || speech_worker.run())
            .map_err(|source| PipelineError::Spawn {
                worker: "speech",
                source,
            })?;

        if !self.signals.consumer_ready.wait_timeout(pipeline.ready_timeout()) {
            log::warn!(
                "pipeline: speech worker not ready after {:?}; starting chat reader anyway",
                pipeline.ready_timeout()
            );
        }
        if matches!(speech_state.get(), SpeechState::Failed | SpeechState::Stopped) {
            self.signals.shutdown.set();
            speaker.join_timeout(pipeline.join_timeout());
            return Err(PipelineError::SpeechUnavailable);
        }

        // ── Ingestion worker ──────────────────────────────────────────────
        let ingest_worker = IngestionWorker::new(
            Arc::clone(&self.source),
            &self.config.chat,
            self.channel.clone(),
            Arc::clone(&self.signals),
        );
        let ingest_state = ingest_worker.state();
        let reader = match WorkerHandle::spawn("chat-reader", move || {
            ingest_worker.run();
        }) {
            Ok(handle) => handle,
            Err(source) => {
                self.signals.shutdown.set();
                speaker.join_timeout(pipeline.join_timeout());
                return Err(PipelineError::Spawn {
                    worker: "chat reader",
                    source,
                });
            }
        };

        say(&out, "");
        say(&out, "Controls:");
        say(&out, "  p - Pause/Resume");
        say(&out, "  q - Quit");
        say(&out, "-".repeat(RULE.len()));
        say(&out, "");

        // ── Command loop ──────────────────────────────────────────────────
        let loop_result = self.command_loop(input, &out, &speaker);
        if let Err(e) = &loop_result {
            log::error!("pipeline: operator input failed: {e}");
        }

        // ── Shutdown ──────────────────────────────────────────────────────
        self.signals.shutdown.set();
        say(&out, "Waiting for threads to stop...");
        reader.join_timeout(pipeline.join_timeout());
        speaker.join_timeout(pipeline.join_timeout());
        say(&out, "Done");

        if loop_result? == LoopEnd::ConsumerLost {
            return Err(PipelineError::SpeechUnavailable);
        }
        if ingest_state.get() == IngestState::Failed {
            return Err(PipelineError::ChatUnavailable);
        }
        Ok(())
    }

    fn command_loop<R>(
        &self,
        input: R,
        out: &Echo,
        speaker: &WorkerHandle,
    ) -> io::Result<LoopEnd>
    where
        R: BufRead + Send + 'static,
    {
        let lines = spawn_line_reader(input)?;
        let poll = self.config.pipeline.poll_interval();

        while !self.signals.shutdown.is_set() {
            // Finished first: a worker that stopped for shutdown saw the latch
            // set before it finished.
            if speaker.is_finished() && !self.signals.shutdown.is_set() {
                log::error!("pipeline: speech worker stopped unexpectedly; shutting down");
                return Ok(LoopEnd::ConsumerLost);
            }

            let line = match lines.recv_timeout(poll) {
                Ok(line) => line?,
                Err(RecvTimeoutError::Timeout) => continue,
                // stdin closed
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match OperatorCommand::parse(&line) {
                OperatorCommand::TogglePause => {
                    if self.signals.pause.toggle() {
                        say(out, "⏸  PAUSED");
                    } else {
                        say(out, "▶  RESUMED");
                    }
                }
                OperatorCommand::Quit => {
                    say(out, "Quitting...");
                    self.signals.shutdown.set();
                    break;
                }
                OperatorCommand::Blank => {}
                OperatorCommand::Unknown(cmd) => {
                    say(out, format!("Unknown command: {cmd}"));
                    say(out, "Use 'p' to pause/resume or 'q' to quit");
                }
            }
        }

        Ok(LoopEnd::Finished)
    }
}

/// Why the command loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// Quit, end of input, or shutdown from elsewhere.
    Finished,
    /// The speech worker exited while the session was running.
    ConsumerLost,
}

/// Read `input` line by line on a detached thread.
///
/// A blocking stdin read cannot be interrupted, so the loop polls this
/// channel instead and stays responsive to shutdown.  The channel
/// disconnects at end of input.
fn spawn_line_reader<R>(input: R) -> io::Result<Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn say(out: &Echo, line: impl Display) {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
