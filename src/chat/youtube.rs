//! YouTube live chat client.
//!
//! # Protocol
//!
//! ```text
//! connect
//!   GET  /live_chat?is_popout=1&v=ID        (Cookie header from credential)
//!        └─ ytInitialData → liveChatRenderer.continuations[0]
//!           INNERTUBE_API_KEY, INNERTUBE_CONTEXT_CLIENT_VERSION
//! next_message
//!   POST /youtubei/v1/live_chat/get_live_chat?key=KEY
//!        { context.client { WEB, version }, continuation }
//!        └─ actions[].addChatItemAction.item → ChatMessage
//!           continuations[0]                 → next poll (none → end)
//!           timeoutMs                        → wait before next poll
//! ```
//!
//! HTTP runs on a current-thread tokio runtime owned by the stream, so the
//! blocking [`ChatStream`] interface stays usable from a plain worker thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{ChatError, ChatMessage, ChatSource, ChatStream, Credential, MessageKind};
use crate::pipeline::Latch;

const HOST: &str = "www.youtube.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Used when the page does not announce a client version.
const FALLBACK_CLIENT_VERSION: &str = "2.20240101.00.00";

const MIN_POLL: Duration = Duration::from_secs(1);
const MAX_POLL: Duration = Duration::from_secs(5);

const CONTINUATION_KINDS: [&str; 4] = [
    "invalidationContinuationData",
    "timedContinuationData",
    "reloadContinuationData",
    "liveChatReplayContinuationData",
];

static VIDEO_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://(?:www\.)?youtube\.com/watch\?v=([\w-]+)",
        r"^https?://youtu\.be/([\w-]+)",
        r"^https?://(?:www\.)?youtube\.com/live/([\w-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid video id pattern"))
    .collect()
});

static INITIAL_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:window\s*\[\s*["']ytInitialData["']\s*\]|ytInitialData)\s*=\s*"#)
        .expect("valid ytInitialData pattern")
});

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("valid api key pattern")
});

static CLIENT_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_CONTEXT_CLIENT_VERSION"\s*:\s*"([^"]+)""#)
        .expect("valid client version pattern")
});

// ---------------------------------------------------------------------------
// YouTubeChat
// ---------------------------------------------------------------------------

/// [`ChatSource`] for YouTube live streams.
#[derive(Debug, Default, Clone)]
pub struct YouTubeChat;

impl YouTubeChat {
    pub fn new() -> Self {
        Self
    }
}

impl ChatSource for YouTubeChat {
    fn connect(
        &self,
        target: &str,
        credential: Option<&Credential>,
        interrupt: Arc<Latch>,
    ) -> Result<Box<dyn ChatStream>, ChatError> {
        let video_id = video_id(target)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ChatError::Request(format!("cannot start HTTP runtime: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        if let Some(cookie) = credential.and_then(|c| c.header_for(HOST)) {
            let value = reqwest::header::HeaderValue::from_str(&cookie)
                .map_err(|e| ChatError::Credential(format!("cookie header: {e}")))?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let page_url = format!("https://{HOST}/live_chat?is_popout=1&v={video_id}");
        log::debug!("chat-reader: fetching {page_url}");
        let html = runtime.block_on(async {
            client
                .get(&page_url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        })?;

        let page = parse_page(&html)?;
        log::debug!(
            "chat-reader: live chat page parsed (client version {})",
            page.client_version
        );

        Ok(Box::new(YouTubeStream {
            runtime,
            client,
            api_key: page.api_key,
            client_version: page.client_version,
            continuation: Some(page.continuation),
            pending: VecDeque::new(),
            wait: None,
            interrupt,
        }))
    }
}

// ---------------------------------------------------------------------------
// YouTubeStream
// ---------------------------------------------------------------------------

struct YouTubeStream {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
    api_key: String,
    client_version: String,
    continuation: Option<String>,
    pending: VecDeque<Result<ChatMessage, ChatError>>,
    /// Delay before the next poll; `None` before the first one.
    wait: Option<Duration>,
    interrupt: Arc<Latch>,
}

impl YouTubeStream {
    fn fetch(&self, continuation: &str) -> Result<Value, ChatError> {
        let url = format!(
            "https://{HOST}/youtubei/v1/live_chat/get_live_chat?key={}",
            self.api_key
        );
        let body = json!({
            "context": {
                "client": {
                    "clientName":    "WEB",
                    "clientVersion": self.client_version
                }
            },
            "continuation": continuation
        });

        let response = self.runtime.block_on(async {
            self.client
                .post(&url)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        })?;
        Ok(response)
    }
}

impl ChatStream for YouTubeStream {
    fn next_message(&mut self) -> Result<Option<ChatMessage>, ChatError> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return item.map(Some);
            }

            let Some(continuation) = self.continuation.take() else {
                return Ok(None);
            };

            if let Some(wait) = self.wait {
                if self.interrupt.wait_timeout(wait) {
                    return Ok(None);
                }
            }

            let batch = parse_poll(&self.fetch(&continuation)?);
            self.continuation = batch.continuation;
            self.wait = Some(poll_delay(batch.timeout_ms));
            self.pending.extend(batch.items);
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Values scraped from the popout chat page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChatPage {
    pub api_key: String,
    pub client_version: String,
    pub continuation: String,
}

/// One `get_live_chat` response.
#[derive(Debug)]
pub(crate) struct PollBatch {
    pub items: Vec<Result<ChatMessage, ChatError>>,
    pub continuation: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Extract the video id from any accepted stream URL shape.
pub fn video_id(url: &str) -> Result<String, ChatError> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ChatError::InvalidTarget(url.to_string()))
}

pub(crate) fn parse_page(html: &str) -> Result<ChatPage, ChatError> {
    let data = initial_data(html).ok_or_else(|| {
        ChatError::Parse("ytInitialData not found (cookie consent page?)".into())
    })?;

    let renderer = &data["contents"]["liveChatRenderer"];
    if renderer.is_null() {
        return Err(ChatError::ChatUnavailable(
            "stream has no live chat (not live, ended, or chat disabled)".into(),
        ));
    }
    let (continuation, _) = first_continuation(&renderer["continuations"]).ok_or_else(|| {
        ChatError::ChatUnavailable("live chat has no continuation".into())
    })?;

    let api_key = API_KEY_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ChatError::Parse("INNERTUBE_API_KEY not found".into()))?;
    let client_version = CLIENT_VERSION_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map_or_else(|| FALLBACK_CLIENT_VERSION.to_string(), |m| m.as_str().to_string());

    Ok(ChatPage {
        api_key,
        client_version,
        continuation,
    })
}

/// Decode the JSON object assigned to `ytInitialData`, ignoring whatever
/// script text follows it.
fn initial_data(html: &str) -> Option<Value> {
    let start = INITIAL_DATA_RE.find(html)?.end();
    serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
        .filter(Value::is_object)
}

fn first_continuation(continuations: &Value) -> Option<(String, Option<u64>)> {
    continuations.as_array()?.iter().find_map(|entry| {
        CONTINUATION_KINDS.iter().find_map(|kind| {
            let data = &entry[*kind];
            let token = data["continuation"].as_str()?;
            Some((token.to_string(), data["timeoutMs"].as_u64()))
        })
    })
}

pub(crate) fn parse_poll(response: &Value) -> PollBatch {
    let chat = &response["continuationContents"]["liveChatContinuation"];
    let (continuation, timeout_ms) = match first_continuation(&chat["continuations"]) {
        Some((token, timeout)) => (Some(token), timeout),
        None => (None, None),
    };

    let items = chat["actions"]
        .as_array()
        .map(|actions| {
            actions
                .iter()
                .filter_map(|action| action.get("addChatItemAction"))
                .map(|add| parse_item(&add["item"]))
                .collect()
        })
        .unwrap_or_default();

    PollBatch {
        items,
        continuation,
        timeout_ms,
    }
}

/// Map one chat item (an object keyed by its renderer name) to a message.
pub(crate) fn parse_item(item: &Value) -> Result<ChatMessage, ChatError> {
    let (name, renderer) = item
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| ChatError::Malformed("chat item has no renderer".into()))?;
    if !renderer.is_object() {
        return Err(ChatError::Malformed(format!("{name} is not an object")));
    }

    let author = renderer["authorName"]["simpleText"]
        .as_str()
        .map(str::to_string);

    let (kind, body) = match name.as_str() {
        "liveChatTextMessageRenderer" => (MessageKind::Text, text_of(&renderer["message"])),
        "liveChatPaidMessageRenderer" | "liveChatPaidStickerRenderer" => {
            (MessageKind::Paid, text_of(&renderer["message"]))
        }
        "liveChatMembershipItemRenderer"
        | "liveChatSponsorshipsGiftPurchaseAnnouncementRenderer"
        | "liveChatSponsorshipsGiftRedemptionAnnouncementRenderer"
        | "liveChatViewerEngagementMessageRenderer"
        | "liveChatModeChangeMessageRenderer" => {
            let body = match text_of(&renderer["headerSubtext"]) {
                s if s.is_empty() => text_of(&renderer["message"]),
                s => s,
            };
            (MessageKind::System, body)
        }
        other => (MessageKind::Other(other.to_string()), text_of(&renderer["message"])),
    };

    Ok(ChatMessage { kind, author, body })
}

/// Flatten a `simpleText` or `runs` text object.  Emoji runs become their
/// first shortcut (`:smile:`) or, failing that, their id.
fn text_of(value: &Value) -> String {
    if let Some(s) = value["simpleText"].as_str() {
        return s.to_string();
    }
    let Some(runs) = value["runs"].as_array() else {
        return String::new();
    };

    runs.iter()
        .filter_map(|run| {
            run["text"].as_str().or_else(|| {
                let emoji = &run["emoji"];
                emoji["shortcuts"][0]
                    .as_str()
                    .or_else(|| emoji["emojiId"].as_str())
            })
        })
        .collect()
}

/// Wait before the next poll, as requested by the server, clamped to 1–5 s.
pub(crate) fn poll_delay(timeout_ms: Option<u64>) -> Duration {
    timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(MIN_POLL)
        .clamp(MIN_POLL, MAX_POLL)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
