//! Recording speech backend for pipeline tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::{SpeechBackend, SpeechDevice, SpeechError, SpeechSettings};

/// What a [`MockSpeechBackend`] and its devices observed.
#[derive(Debug, Default)]
pub struct SpeechLog {
    pub spoken: Vec<String>,
    pub settings: Option<SpeechSettings>,
    pub cancelled: usize,
    pub closed: bool,
}

/// Backend whose devices append every utterance to a shared [`SpeechLog`].
#[derive(Clone, Default)]
pub struct MockSpeechBackend {
    log: Arc<Mutex<SpeechLog>>,
    fail_connect: bool,
    panic_connect: bool,
    reject: Option<String>,
    panic_on: Option<String>,
}

impl MockSpeechBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `connect` always fails with [`SpeechError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// `speak` rejects exactly this text; everything else is recorded.
    pub fn rejecting(text: &str) -> Self {
        Self {
            reject: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// `speak` panics on exactly this text.
    pub fn panicking_on(text: &str) -> Self {
        Self {
            panic_on: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// `connect` panics.
    pub fn panicking_on_connect() -> Self {
        Self {
            panic_connect: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).spoken.clone()
    }

    pub fn with_log<T>(&self, f: impl FnOnce(&SpeechLog) -> T) -> T {
        f(&self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl SpeechBackend for MockSpeechBackend {
    fn connect(&self, _client_name: &str) -> Result<Box<dyn SpeechDevice>, SpeechError> {
        if self.panic_connect {
            panic!("mock backend crashed while connecting");
        }
        if self.fail_connect {
            return Err(SpeechError::Unavailable("mock backend offline".into()));
        }
        Ok(Box::new(MockSpeechDevice {
            log: Arc::clone(&self.log),
            reject: self.reject.clone(),
            panic_on: self.panic_on.clone(),
        }))
    }
}

struct MockSpeechDevice {
    log: Arc<Mutex<SpeechLog>>,
    reject: Option<String>,
    panic_on: Option<String>,
}

impl SpeechDevice for MockSpeechDevice {
    fn configure(&mut self, settings: &SpeechSettings) -> Result<(), SpeechError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).settings = Some(settings.clone());
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        if self.panic_on.as_deref() == Some(text) {
            panic!("mock device crashed on {text:?}");
        }
        if self.reject.as_deref() == Some(text) {
            return Err(SpeechError::Rejected(text.to_string()));
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spoken
            .push(text.to_string());
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), SpeechError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).cancelled += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SpeechError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
        Ok(())
    }
}
