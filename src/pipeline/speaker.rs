//! Speech worker — [`MessageChannel`] → speech device, honouring pause and
//! shutdown.
//!
//! # Flow
//!
//! ```text
//! Init   ─ connect + configure ─┬─ Err → Failed (consumer_ready still set) → Stopped
//!                               └─ Ok  → Ready (consumer_ready set)
//! Ready  ─ loop until shutdown {
//!            pop(poll)                 → nothing? loop
//!            pause gate (Paused)       → shutdown while paused? drop item, exit
//!            echo + speak              → error? log, keep going
//!          }
//! Stopped ─ cancel + close (errors logged)
//! ```
//!
//! A panic anywhere above is caught at the loop boundary and still ends in
//! Stopped.
//!
//! Every blocking wait is bounded by the poll interval, so shutdown is seen
//! within one interval even while idle or paused.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::speech::{SpeechBackend, SpeechDevice, SpeechError, SpeechSettings};

use super::channel::MessageChannel;
use super::signals::ControlSignals;
use super::state::{SpeechState, StateCell};
use super::worker::panic_message;

const WORKER: &str = "speech";

/// Client name announced to the speech service.
pub const CLIENT_NAME: &str = "yt-liveread";

/// Where spoken messages are echoed for the operator.
pub type Echo = Arc<Mutex<dyn Write + Send>>;

/// Consumer half of the pipeline.
pub struct SpeechWorker {
    backend: Arc<dyn SpeechBackend>,
    settings: SpeechSettings,
    channel: MessageChannel,
    signals: Arc<ControlSignals>,
    poll_interval: Duration,
    echo: Option<Echo>,
    state: StateCell<SpeechState>,
}

impl SpeechWorker {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        settings: SpeechSettings,
        channel: MessageChannel,
        signals: Arc<ControlSignals>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            settings,
            channel,
            signals,
            poll_interval,
            echo: None,
            state: StateCell::new(SpeechState::Init),
        }
    }

    /// Print each message to `echo` right before it is spoken.
    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Observable state, shared with whoever spawned the worker.
    pub fn state(&self) -> StateCell<SpeechState> {
        self.state.clone()
    }

    /// Run to completion on the calling thread.
    ///
    /// A panic during setup, in the loop, or while releasing the device is
    /// caught here; the worker always ends in [`SpeechState::Stopped`] with
    /// `consumer_ready` set.
    pub fn run(self) {
        let setup = panic::catch_unwind(AssertUnwindSafe(|| self.setup())).unwrap_or_else(
            |payload| {
                Err(SpeechError::Unavailable(format!(
                    "setup panicked: {}",
                    panic_message(&payload)
                )))
            },
        );
        let mut device = match setup {
            Ok(device) => device,
            Err(e) => {
                log::error!("{WORKER}: failed to initialize Speech Dispatcher: {e}");
                log::error!("Make sure speech-dispatcher is installed and running:");
                log::error!("  sudo apt install speech-dispatcher");
                log::error!("  systemctl --user status speech-dispatcher");
                self.state.set(WORKER, SpeechState::Failed);
                // Never leave the orchestrator waiting on a consumer that
                // will not arrive.
                self.signals.consumer_ready.set();
                self.state.set(WORKER, SpeechState::Stopped);
                return;
            }
        };

        log::info!(
            "{WORKER}: Speech Dispatcher initialized (module: {}, priority: {})",
            self.settings.module,
            self.settings.priority.as_str()
        );
        self.state.set(WORKER, SpeechState::Ready);
        self.signals.consumer_ready.set();

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| self.speak_loop(device.as_mut())))
        {
            log::error!("{WORKER}: speaker loop failed: {}", panic_message(&payload));
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| release(device.as_mut()))) {
            log::error!(
                "{WORKER}: releasing the speech device failed: {}",
                panic_message(&payload)
            );
        }

        self.state.set(WORKER, SpeechState::Stopped);
        log::info!("{WORKER}: speaker thread stopped");
    }

    fn setup(&self) -> Result<Box<dyn SpeechDevice>, SpeechError> {
        let mut device = self.backend.connect(CLIENT_NAME)?;
        if let Err(e) = device.configure(&self.settings) {
            let _ = device.close();
            return Err(e);
        }
        Ok(device)
    }

    fn speak_loop(&self, device: &mut dyn SpeechDevice) {
        while !self.signals.shutdown.is_set() {
            let Some(text) = self.channel.pop(self.poll_interval) else {
                continue;
            };

            if !self.wait_while_paused() {
                log::debug!("{WORKER}: shutdown while paused, dropping message");
                break;
            }

            self.echo_line(&text);
            if let Err(e) = device.speak(&text) {
                log::warn!("{WORKER}: error speaking message: {e}");
            }
        }
    }

    /// Block while pause is on.  Returns `false` if shutdown was requested
    /// in the meantime.
    fn wait_while_paused(&self) -> bool {
        let pause = &self.signals.pause;
        if pause.is_on() {
            self.state.set(WORKER, SpeechState::Paused);
            while !pause.wait_off(self.poll_interval) {
                if self.signals.shutdown.is_set() {
                    break;
                }
            }
            self.state.set(WORKER, SpeechState::Ready);
        }
        !self.signals.shutdown.is_set()
    }

    fn echo_line(&self, text: &str) {
        if let Some(echo) = &self.echo {
            let mut out = echo.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        }
    }
}

/// Cancel whatever is still queued for this client and close the connection.
fn release(device: &mut dyn SpeechDevice) {
    if let Err(e) = device.cancel() {
        log::warn!("{WORKER}: error cancelling pending speech: {e}");
    }
    if let Err(e) = device.close() {
        log::warn!("{WORKER}: error closing Speech Dispatcher client: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeechConfig;
    use crate::pipeline::worker::WorkerHandle;
    use crate::speech::mock::MockSpeechBackend;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(20);

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    struct Harness {
        backend: MockSpeechBackend,
        channel: MessageChannel,
        signals: Arc<ControlSignals>,
        state: StateCell<SpeechState>,
        handle: WorkerHandle,
    }

    fn start(backend: MockSpeechBackend, channel: MessageChannel, signals: Arc<ControlSignals>) -> Harness {
        let worker = SpeechWorker::new(
            Arc::new(backend.clone()),
            SpeechSettings::from(&SpeechConfig::default()),
            channel.clone(),
            Arc::clone(&signals),
            POLL,
        );
        let state = worker.state();
        let handle = WorkerHandle::spawn("speech-test", move || worker.run()).unwrap();
        Harness {
            backend,
            channel,
            signals,
            state,
            handle,
        }
    }

    #[test]
    fn speaks_queued_messages_in_order() {
        let channel = MessageChannel::new(8);
        for s in ["one", "two", "three"] {
            channel.push(s.into());
        }
        let h = start(MockSpeechBackend::new(), channel, Arc::new(ControlSignals::new()));

        assert!(wait_until(Duration::from_secs(5), || h.backend.spoken().len() == 3));
        assert_eq!(h.backend.spoken(), ["one", "two", "three"]);

        h.signals.shutdown.set();
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
        assert_eq!(h.state.get(), SpeechState::Stopped);
        h.backend.with_log(|log| {
            assert!(log.closed);
            assert_eq!(log.cancelled, 1);
            assert_eq!(log.settings.as_ref().map(|s| s.volume), Some(100));
        });
    }

    #[test]
    fn paused_worker_speaks_nothing_until_resumed() {
        let channel = MessageChannel::new(8);
        let signals = Arc::new(ControlSignals::new());
        signals.pause.set(true);
        for s in ["a", "b", "c"] {
            channel.push(s.into());
        }
        let h = start(MockSpeechBackend::new(), channel, signals);

        assert!(wait_until(Duration::from_secs(5), || h.state.get() == SpeechState::Paused));
        std::thread::sleep(POLL * 5);
        assert!(h.backend.spoken().is_empty());

        h.signals.pause.set(false);
        assert!(wait_until(Duration::from_secs(5), || h.backend.spoken().len() == 3));
        assert_eq!(h.backend.spoken(), ["a", "b", "c"]);

        h.signals.shutdown.set();
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn shutdown_while_paused_exits_without_speaking() {
        let channel = MessageChannel::new(8);
        let signals = Arc::new(ControlSignals::new());
        signals.pause.set(true);
        channel.push("held".into());
        channel.push("queued".into());
        let h = start(MockSpeechBackend::new(), channel, signals);

        assert!(wait_until(Duration::from_secs(5), || h.state.get() == SpeechState::Paused));

        let start = Instant::now();
        h.signals.shutdown.set();
        assert!(h.handle.join_timeout(POLL * 10));
        assert!(start.elapsed() < Duration::from_secs(1));

        assert!(h.backend.spoken().is_empty());
        // The held message was dropped; the other one stays buffered.
        assert_eq!(h.channel.len(), 1);
        assert_eq!(h.state.get(), SpeechState::Stopped);
    }

    #[test]
    fn idle_worker_observes_shutdown_within_poll_interval() {
        let h = start(
            MockSpeechBackend::new(),
            MessageChannel::new(4),
            Arc::new(ControlSignals::new()),
        );
        assert!(h.signals.consumer_ready.wait_timeout(Duration::from_secs(5)));

        h.signals.shutdown.set();
        assert!(h.handle.join_timeout(POLL * 10));
    }

    #[test]
    fn rejected_utterance_does_not_stop_the_worker() {
        let channel = MessageChannel::new(8);
        for s in ["ok 1", "bad", "ok 2"] {
            channel.push(s.into());
        }
        let h = start(MockSpeechBackend::rejecting("bad"), channel, Arc::new(ControlSignals::new()));

        assert!(wait_until(Duration::from_secs(5), || h.backend.spoken().len() == 2));
        assert_eq!(h.backend.spoken(), ["ok 1", "ok 2"]);
        assert_eq!(h.state.get(), SpeechState::Ready);

        h.signals.shutdown.set();
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn setup_failure_still_signals_ready() {
        let channel = MessageChannel::new(4);
        channel.push("never spoken".into());
        let h = start(MockSpeechBackend::unavailable(), channel, Arc::new(ControlSignals::new()));

        assert!(h.signals.consumer_ready.wait_timeout(Duration::from_secs(5)));
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
        assert_eq!(h.state.get(), SpeechState::Stopped);
        assert_eq!(h.channel.len(), 1);
        assert!(!h.signals.shutdown.is_set());
    }

    #[test]
    fn panic_while_speaking_still_releases_the_device() {
        let channel = MessageChannel::new(4);
        channel.push("boom".into());
        channel.push("after".into());
        let h = start(
            MockSpeechBackend::panicking_on("boom"),
            channel,
            Arc::new(ControlSignals::new()),
        );

        assert!(wait_until(Duration::from_secs(5), || h.state.get() == SpeechState::Stopped));
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
        assert!(h.backend.spoken().is_empty());
        h.backend.with_log(|log| {
            assert!(log.closed);
            assert_eq!(log.cancelled, 1);
        });
    }

    #[test]
    fn panic_during_setup_still_signals_ready() {
        let h = start(
            MockSpeechBackend::panicking_on_connect(),
            MessageChannel::new(4),
            Arc::new(ControlSignals::new()),
        );

        assert!(h.signals.consumer_ready.wait_timeout(Duration::from_secs(5)));
        assert!(h.handle.join_timeout(Duration::from_secs(2)));
        assert_eq!(h.state.get(), SpeechState::Stopped);
    }

    #[test]
    fn echo_prints_each_message() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let channel = MessageChannel::new(4);
        channel.push("A says: hi".into());
        let signals = Arc::new(ControlSignals::new());

        let backend = MockSpeechBackend::new();
        let echo_sink = Arc::clone(&buffer);
        let worker = SpeechWorker::new(
            Arc::new(backend.clone()),
            SpeechSettings::from(&SpeechConfig::default()),
            channel,
            Arc::clone(&signals),
            POLL,
        )
        .with_echo(echo_sink);
        let handle = WorkerHandle::spawn("speech-echo", move || worker.run()).unwrap();

        assert!(wait_until(Duration::from_secs(5), || backend.spoken().len() == 1));
        signals.shutdown.set();
        assert!(handle.join_timeout(Duration::from_secs(2)));

        let printed = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(printed, "A says: hi\n");
    }
}
