//! Read YouTube live chat aloud through Speech Dispatcher.
//!
//! * [`chat`] — live chat client, message formatting, cookie credential.
//! * [`speech`] — speech output seam and the SSIP backend.
//! * [`pipeline`] — bounded queue, workers, signals, and the orchestrator.
//! * [`config`] — settings persisted as TOML.
//! * [`cli`] — command-line flags layered over the settings.

pub mod chat;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod speech;
