//! Named worker threads with a bounded join.
//!
//! `std::thread::JoinHandle::join` has no timeout, so every worker carries a
//! `finished` [`Latch`] that is set by a drop guard when the thread body
//! returns or unwinds.  [`WorkerHandle::join_timeout`] waits on the latch and
//! only joins once the thread is known to be done.
//!
//! # Limitation
//!
//! A worker stuck in a call it cannot interrupt (e.g. a network read) is
//! detached after the timeout, not killed.  It keeps running until the
//! process exits.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::signals::Latch;

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    finished: Arc<Latch>,
    thread: Option<JoinHandle<()>>,
}

/// Sets the latch when the worker thread ends, including by panic.
struct FinishGuard(Arc<Latch>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.set();
    }
}

impl WorkerHandle {
    /// Spawn `body` on a new OS thread called `name`.
    ///
    /// A panic inside `body` is caught and logged; it never takes down the
    /// process.
    pub fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let finished = Arc::new(Latch::new());
        let guard = FinishGuard(Arc::clone(&finished));
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
                    log::error!("{thread_name}: worker panicked: {}", panic_message(&payload));
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            finished,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_set()
    }

    /// Wait up to `timeout` for the worker to finish.
    ///
    /// Returns `true` if the thread finished and was joined, `false` if it
    /// was still running and has been detached.
    pub fn join_timeout(mut self, timeout: Duration) -> bool {
        if !self.finished.wait_timeout(timeout) {
            log::warn!(
                "pipeline: {} did not stop within {:?}; detaching it",
                self.name,
                timeout
            );
            return false;
        }

        if let Some(thread) = self.thread.take() {
            // The body already returned or unwound, so this join is immediate.
            let _ = thread.join();
        }
        log::debug!("pipeline: {} stopped", self.name);
        true
    }
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn finished_worker_joins() {
        let handle = WorkerHandle::spawn("quick", || {}).unwrap();
        assert_eq!(handle.name(), "quick");
        assert!(handle.join_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn stuck_worker_is_detached_after_timeout() {
        let release = Arc::new(Latch::new());
        let gate = Arc::clone(&release);
        let handle = WorkerHandle::spawn("stuck", move || {
            gate.wait_timeout(Duration::from_secs(10));
        })
        .unwrap();

        let start = Instant::now();
        assert!(!handle.join_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_secs(5));

        release.set();
    }

    #[test]
    fn panicking_worker_still_finishes() {
        let handle = WorkerHandle::spawn("boom", || panic!("worker exploded")).unwrap();
        assert!(handle.join_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn panic_message_formats_payloads() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&a), "static");
        assert_eq!(panic_message(&b), "owned");
        assert_eq!(panic_message(&c), "unknown panic payload");
    }
}
