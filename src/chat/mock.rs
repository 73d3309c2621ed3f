//! Scripted chat source for pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{ChatError, ChatMessage, ChatSource, ChatStream, Credential};
use crate::pipeline::Latch;

/// A value written by the source and read back by the test.
#[derive(Clone, Default)]
pub struct Recorder<T>(Arc<Mutex<T>>);

impl<T: Clone> Recorder<T> {
    pub fn get(&self) -> T {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Replays a fixed script of messages and errors, then ends the stream.
#[derive(Default)]
pub struct MockChatSource {
    script: Mutex<Vec<Result<ChatMessage, ChatError>>>,
    connect_error: Option<ChatError>,
    hold_open: bool,
    panic_when_drained: bool,
    connects: Recorder<usize>,
    credential: Recorder<Option<Credential>>,
}

impl MockChatSource {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self::scripted(messages.into_iter().map(Ok).collect())
    }

    pub fn scripted(script: Vec<Result<ChatMessage, ChatError>>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// Every `connect` fails with `error`.
    pub fn failing(error: ChatError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::default()
        }
    }

    /// After the script runs out, block until shutdown instead of ending.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// After the script runs out, panic inside `next_message`.
    pub fn then_panic(mut self) -> Self {
        self.panic_when_drained = true;
        self
    }

    pub fn connect_count(&self) -> Recorder<usize> {
        self.connects.clone()
    }

    pub fn seen_credential(&self) -> Recorder<Option<Credential>> {
        self.credential.clone()
    }
}

impl ChatSource for MockChatSource {
    fn connect(
        &self,
        _target: &str,
        credential: Option<&Credential>,
        interrupt: Arc<Latch>,
    ) -> Result<Box<dyn ChatStream>, ChatError> {
        self.connects.update(|n| *n += 1);
        self.credential.update(|c| *c = credential.cloned());

        if let Some(e) = &self.connect_error {
            return Err(e.clone());
        }

        let script = std::mem::take(&mut *self.script.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(Box::new(MockChatStream {
            pending: script.into(),
            hold_open: self.hold_open,
            panic_when_drained: self.panic_when_drained,
            interrupt,
        }))
    }
}

struct MockChatStream {
    pending: VecDeque<Result<ChatMessage, ChatError>>,
    hold_open: bool,
    panic_when_drained: bool,
    interrupt: Arc<Latch>,
}

impl ChatStream for MockChatStream {
    fn next_message(&mut self) -> Result<Option<ChatMessage>, ChatError> {
        match self.pending.pop_front() {
            Some(item) => item.map(Some),
            None => {
                if self.panic_when_drained {
                    panic!("mock chat stream crashed");
                }
                if self.hold_open {
                    while !self.interrupt.wait_timeout(Duration::from_millis(20)) {}
                }
                Ok(None)
            }
        }
    }
}
