//! Upstream live chat module.
//!
//! This module provides:
//! * [`ChatSource`] / [`ChatStream`] — the seam the ingestion worker pulls
//!   messages through.
//! * [`ChatMessage`] / [`MessageKind`] — the wire form of one chat event.
//! * [`MessageFormatter`] — turns a message into the text that gets spoken.
//! * [`Credential`] — exported browser cookies used to open the session.
//! * [`YouTubeChat`] — live chat client for YouTube streams.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yt_liveread::chat::{ChatSource, YouTubeChat};
//! use yt_liveread::pipeline::Latch;
//!
//! let source = YouTubeChat::new();
//! let stop = Arc::new(Latch::new());
//! let mut stream = source
//!     .connect("https://www.youtube.com/watch?v=VIDEO_ID", None, stop)
//!     .unwrap();
//!
//! while let Ok(Some(message)) = stream.next_message() {
//!     println!("{:?}: {}", message.author, message.body);
//! }
//! ```

pub mod cookies;
pub mod format;
#[cfg(test)]
pub mod mock;
pub mod youtube;

use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::Latch;

pub use cookies::Credential;
pub use format::{MessageFormatter, LINK_PLACEHOLDER};
pub use youtube::YouTubeChat;

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Errors raised while opening or reading a chat stream.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// The target does not identify a stream this source understands.
    #[error("invalid stream target: {0}")]
    InvalidTarget(String),

    /// The stream page could not be parsed (often a cookie consent page).
    #[error("unable to parse video data: {0}")]
    Parse(String),

    /// The stream exists but exposes no live chat.
    #[error("chat not available: {0}")]
    ChatUnavailable(String),

    /// The cookie file could not be read or held no usable cookies.
    #[error("invalid credential: {0}")]
    Credential(String),

    /// Transport failure talking to the chat service.
    #[error("chat request failed: {0}")]
    Request(String),

    /// One message could not be decoded; the stream itself is fine.
    #[error("malformed chat message: {0}")]
    Malformed(String),
}

impl ChatError {
    /// `true` for errors that only affect one message.  The ingestion worker
    /// skips such messages instead of stopping.
    pub fn is_per_item(&self) -> bool {
        matches!(self, ChatError::Malformed(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// Kind tag of a chat event.  Only [`MessageKind::Text`] is ever spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Ordinary text message.
    Text,
    /// Paid message (Super Chat / Super Sticker).
    Paid,
    /// Membership, moderation and other service announcements.
    System,
    /// Anything the source did not classify, with its native type name.
    Other(String),
}

/// One chat event as delivered by a [`ChatStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: MessageKind,
    /// Author display name, if the event has one.
    pub author: Option<String>,
    /// Message body; may be empty.
    pub body: String,
}

impl ChatMessage {
    /// Shorthand for a plain text message.
    pub fn text(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            author: Some(author.into()),
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open chat session.  Used only from the thread that opened it.
pub trait ChatStream {
    /// Block until the next message arrives.
    ///
    /// Returns `Ok(None)` once the stream has ended.
    fn next_message(&mut self) -> Result<Option<ChatMessage>, ChatError>;
}

/// Opens chat sessions.
pub trait ChatSource: Send + Sync {
    /// Open a session for `target`.
    ///
    /// `interrupt` is the pipeline shutdown latch; sources that wait between
    /// polls wake early once it is set.
    fn connect(
        &self,
        target: &str,
        credential: Option<&Credential>,
        interrupt: Arc<Latch>,
    ) -> Result<Box<dyn ChatStream>, ChatError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ChatSource>, _: Box<dyn ChatStream>) {}
};
