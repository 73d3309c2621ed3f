//! Worker state machines.
//!
//! ```text
//! Ingestion:  Connecting ──▶ Streaming ──▶ Stopped
//!             Connecting ──▶ Failed
//!
//! Speech:     Init ──▶ Ready ⇄ Paused ──▶ Stopped
//!             Init ──▶ Failed ──▶ Stopped
//! ```
//!
//! Each worker publishes its current state through a [`StateCell`] so the
//! orchestrator (and tests) can observe it from another thread.

use std::sync::{Arc, Mutex, PoisonError};

// ---------------------------------------------------------------------------
// IngestState
// ---------------------------------------------------------------------------

/// States of the ingestion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestState {
    /// Opening the chat session.
    #[default]
    Connecting,
    /// Pulling messages into the queue.
    Streaming,
    /// Finished: end of stream, shutdown, or a fault in the loop.
    Stopped,
    /// The session could not be opened.  Terminal.
    Failed,
}

// ---------------------------------------------------------------------------
// SpeechState
// ---------------------------------------------------------------------------

/// States of the speech worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechState {
    /// Connecting to and configuring the speech device.
    #[default]
    Init,
    /// Taking messages off the queue and speaking them.
    Ready,
    /// Holding a message until pause is released.
    Paused,
    /// Device released; the worker has exited.
    Stopped,
    /// The speech device could not be set up.
    Failed,
}

// ---------------------------------------------------------------------------
// StateCell
// ---------------------------------------------------------------------------

/// Shared, observable worker state.  Cheap to clone (`Arc` clone).
#[derive(Debug, Default)]
pub struct StateCell<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Copy + PartialEq + std::fmt::Debug> StateCell<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> S {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`, logging the transition under `worker`.
    pub fn set(&self, worker: &str, next: S) {
        let mut current = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != next {
            log::debug!("{worker}: {:?} → {:?}", *current, next);
            *current = next;
        }
    }
}
