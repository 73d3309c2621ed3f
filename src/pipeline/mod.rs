//! Pipeline module for the live chat reader.
//!
//! This module wires chat ingestion → bounded queue → speech output and
//! exposes the signals the operator console and Ctrl-C handler act on.
//!
//! # Architecture
//!
//! ```text
//! ChatSource ─▶ IngestionWorker ─ push ─▶ MessageChannel ─ pop ─▶ SpeechWorker ─▶ SpeechDevice
//!   (thread "chat-reader")      newest dropped when full    (thread "speech-worker")
//!
//! Orchestrator (main thread)
//!   ├─ stdin commands: p → toggle pause, q → shutdown
//!   └─ ControlSignals { shutdown, pause, consumer_ready } shared by all
//! ```
//!
//! Every blocking wait is bounded by the configured poll interval, so a
//! shutdown request is observed within one interval everywhere.

pub mod channel;
pub mod command;
pub mod ingest;
pub mod interrupt;
pub mod orchestrator;
pub mod signals;
pub mod speaker;
pub mod state;
pub mod worker;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use channel::{MessageChannel, PushOutcome};
pub use command::OperatorCommand;
pub use ingest::{IngestStats, IngestionWorker};
pub use interrupt::install_interrupt_handler;
pub use orchestrator::{Orchestrator, PipelineError};
pub use signals::{ControlSignals, Latch, Switch};
pub use speaker::{Echo, SpeechWorker};
pub use state::{IngestState, SpeechState, StateCell};
pub use worker::WorkerHandle;
