//! Bounded FIFO of formatted messages between the ingestion and speech
//! workers.
//!
//! Backed by a `crossbeam_channel::bounded` queue.  Pushing never blocks:
//! when the queue is full the **new** message is dropped and buffered
//! messages are left alone, so the reader stays close to the live chat
//! instead of falling further behind.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use yt_liveread::pipeline::{MessageChannel, PushOutcome};
//!
//! let channel = MessageChannel::new(1);
//! assert_eq!(channel.push("first".into()), PushOutcome::Queued);
//! assert_eq!(channel.push("second".into()), PushOutcome::Dropped);
//! assert_eq!(channel.pop(Duration::from_millis(10)).as_deref(), Some("first"));
//! assert_eq!(channel.pop(Duration::from_millis(10)), None);
//! ```

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Result of [`MessageChannel::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The message is buffered and will be spoken.
    Queued,
    /// The buffer was full; the message was discarded.
    Dropped,
}

/// Fixed-capacity message queue shared by both workers.
///
/// Cloning is cheap and every clone refers to the same queue.  Each handle
/// holds both ends, so the queue never disconnects while a handle is alive.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    tx: Sender<String>,
    rx: Receiver<String>,
    capacity: usize,
}

impl MessageChannel {
    /// Create an empty queue holding at most `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "MessageChannel capacity must be > 0");
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Append `item` without blocking.  A full queue drops `item`.
    pub fn push(&self, item: String) -> PushOutcome {
        match self.tx.try_send(item) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                PushOutcome::Dropped
            }
        }
    }

    /// Take the oldest message, waiting at most `timeout`.
    pub fn pop(&self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
