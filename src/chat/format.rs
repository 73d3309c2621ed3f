//! Message normalisation — chat event → text ready to be spoken.
//!
//! Steps, in order:
//!
//! 1. Drop everything that is not a [`MessageKind::Text`] message.
//! 2. Drop messages with an empty body.
//! 3. Replace every `http://` / `https://` URL with [`LINK_PLACEHOLDER`].
//! 4. Cut the result to `max_length` characters and append `...`.
//! 5. Optionally prefix `"<author> says: "`.
//!
//! Links are replaced before truncating so a long URL never eats the length
//! budget and never gets cut into a half-spoken address.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ChatMessage, MessageKind};
use crate::config::ChatConfig;

/// Spoken in place of a URL.
pub const LINK_PLACEHOLDER: &str = "[link]";

/// Appended to truncated messages.
const ELLIPSIS: &str = "...";

/// Used when a text message carries no author name.
const UNKNOWN_AUTHOR: &str = "Unknown";

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

/// Formats [`ChatMessage`]s for the speech queue.
///
/// ```
/// use yt_liveread::chat::{ChatMessage, MessageFormatter};
///
/// let fmt = MessageFormatter::new(200, true);
/// let text = fmt.format(&ChatMessage::text("B", "https://x.y/z check this"));
/// assert_eq!(text.as_deref(), Some("B says: [link] check this"));
/// ```
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    max_length: usize,
    include_username: bool,
}

impl MessageFormatter {
    pub fn new(max_length: usize, include_username: bool) -> Self {
        Self {
            max_length,
            include_username,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.max_message_length, config.include_username)
    }

    /// Normalise `message`, or `None` when it should not be spoken.
    pub fn format(&self, message: &ChatMessage) -> Option<String> {
        if message.kind != MessageKind::Text || message.body.is_empty() {
            return None;
        }

        let redacted = redact_links(&message.body);
        let text = truncate(&redacted, self.max_length);

        if self.include_username {
            let author = message
                .author
                .as_deref()
                .filter(|a| !a.is_empty())
                .unwrap_or(UNKNOWN_AUTHOR);
            Some(format!("{author} says: {text}"))
        } else {
            Some(text)
        }
    }
}

/// Replace every URL in `text` with [`LINK_PLACEHOLDER`].
pub fn redact_links(text: &str) -> String {
    URL_RE.replace_all(text, LINK_PLACEHOLDER).into_owned()
}

/// Keep at most `max_chars` characters, appending `...` when anything was cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt() -> MessageFormatter {
        MessageFormatter::new(200, true)
    }

    #[test]
    fn plain_message_gets_author_prefix() {
        assert_eq!(
            fmt().format(&ChatMessage::text("A", "hi")).as_deref(),
            Some("A says: hi")
        );
    }

    #[test]
    fn username_can_be_left_out() {
        let fmt = MessageFormatter::new(200, false);
        assert_eq!(
            fmt.format(&ChatMessage::text("A", "hi")).as_deref(),
            Some("hi")
        );
    }

    #[test]
    fn missing_author_reads_unknown() {
        let message = ChatMessage {
            kind: MessageKind::Text,
            author: None,
            body: "hello".into(),
        };
        assert_eq!(fmt().format(&message).as_deref(), Some("Unknown says: hello"));
    }

    #[test]
    fn empty_body_is_dropped() {
        assert_eq!(fmt().format(&ChatMessage::text("C", "")), None);
    }

    #[test]
    fn non_text_kinds_are_dropped() {
        for kind in [
            MessageKind::System,
            MessageKind::Paid,
            MessageKind::Other("system_event".into()),
        ] {
            let message = ChatMessage {
                kind,
                author: Some("YouTube".into()),
                body: "Chat is now in slow mode".into(),
            };
            assert_eq!(fmt().format(&message), None);
        }
    }

    #[test]
    fn urls_become_placeholder() {
        assert_eq!(redact_links("see http://x.y/z now"), "see [link] now");
        assert_eq!(
            redact_links("https://a.b and http://c.d/e?f=g"),
            "[link] and [link]"
        );
        assert_eq!(redact_links("no links here"), "no links here");
    }

    #[test]
    fn long_body_is_truncated_with_ellipsis() {
        let fmt = MessageFormatter::new(5, false);
        let out = fmt.format(&ChatMessage::text("A", "abcdefghij")).unwrap();
        assert_eq!(out, "abcde...");
    }

    #[test]
    fn body_at_limit_is_untouched() {
        let fmt = MessageFormatter::new(5, false);
        assert_eq!(
            fmt.format(&ChatMessage::text("A", "abcde")).as_deref(),
            Some("abcde")
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate("ääääää", 3), "äää...");
        assert_eq!(truncate("日本語", 3), "日本語");
    }

    /// Substitution runs first, so a long URL shrinks to the placeholder and
    /// the rest of the message survives.
    #[test]
    fn substitution_happens_before_truncation() {
        let fmt = MessageFormatter::new(12, false);
        let long_url = format!("http://example.com/{}", "a".repeat(100));
        let out = fmt
            .format(&ChatMessage::text("A", format!("{long_url} wow")))
            .unwrap();
        assert_eq!(out, "[link] wow");
    }

    #[test]
    fn truncation_can_cut_the_placeholder_without_panicking() {
        let fmt = MessageFormatter::new(3, false);
        let out = fmt.format(&ChatMessage::text("A", "http://x.y/z")).unwrap();
        assert_eq!(out, "[li...");
    }
}
