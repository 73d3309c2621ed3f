//! Cross-thread control signals.
//!
//! Both signal types wrap a `Mutex<bool>` + `Condvar`, so readers can poll
//! the current value or block on a change with a timeout instead of spinning.
//!
//! * [`Latch`] — one-way, false → true only (shutdown, consumer-ready).
//! * [`Switch`] — bistable, toggled by a single writer (pause).
//!
//! [`ControlSignals`] bundles the three signals the pipeline uses.  The
//! orchestrator builds it once and hands `Arc` clones to the workers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Flag (shared implementation)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Flag {
    value: Mutex<bool>,
    changed: Condvar,
}

impl Flag {
    fn new(initial: bool) -> Self {
        Self {
            value: Mutex::new(initial),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self) -> bool {
        *self.lock()
    }

    fn store(&self, value: bool) {
        let mut guard = self.lock();
        if *guard != value {
            *guard = value;
            self.changed.notify_all();
        }
    }

    fn toggle(&self) -> bool {
        let mut guard = self.lock();
        *guard = !*guard;
        self.changed.notify_all();
        *guard
    }

    /// Block until the flag equals `target` or `timeout` elapses.  Returns
    /// whether the flag equals `target` on return.
    fn wait_for(&self, target: bool, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |v| *v != target)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == target
    }
}

// ---------------------------------------------------------------------------
// Latch
// ---------------------------------------------------------------------------

/// A signal that can only ever go from unset to set.
#[derive(Debug, Default)]
pub struct Latch(Flag);

impl Latch {
    pub fn new() -> Self {
        Self(Flag::new(false))
    }

    /// Set the latch and wake every waiter.  Idempotent.
    pub fn set(&self) {
        self.0.store(true);
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Wait up to `timeout` for the latch to be set.  Returns `true` if it is
    /// set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.wait_for(true, timeout)
    }
}

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

/// A signal that can be turned on and off.
#[derive(Debug, Default)]
pub struct Switch(Flag);

impl Switch {
    pub fn new(on: bool) -> Self {
        Self(Flag::new(on))
    }

    pub fn is_on(&self) -> bool {
        self.0.get()
    }

    pub fn set(&self, on: bool) {
        self.0.store(on);
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        self.0.toggle()
    }

    /// Wait up to `timeout` for the switch to be off.  Returns `true` if it
    /// is off.
    pub fn wait_off(&self, timeout: Duration) -> bool {
        self.0.wait_for(false, timeout)
    }
}

// ---------------------------------------------------------------------------
// ControlSignals
// ---------------------------------------------------------------------------

/// The three signals shared between the orchestrator and the workers.
///
/// | Signal           | Writer            | Readers                    |
/// |------------------|-------------------|----------------------------|
/// | `shutdown`       | anyone (one-way)  | both workers, orchestrator |
/// | `pause`          | orchestrator only | speech worker              |
/// | `consumer_ready` | speech worker     | orchestrator               |
#[derive(Debug, Default)]
pub struct ControlSignals {
    pub shutdown: Arc<Latch>,
    pub pause: Switch,
    pub consumer_ready: Latch,
}

impl ControlSignals {
    /// Fresh signals: running, not paused, consumer not ready.
    pub fn new() -> Self {
        Self::default()
    }
}
