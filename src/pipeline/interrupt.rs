//! Ctrl-C → shutdown.
//!
//! `tokio::signal::ctrl_c` needs a runtime, so a dedicated thread drives a
//! current-thread runtime that waits for the signal and sets the shutdown
//! latch.  The command loop notices within one poll interval, exactly as if
//! the operator had typed `q`.

use std::io;
use std::sync::Arc;

use super::signals::Latch;

/// Spawn the interrupt listener thread.
///
/// The thread lives until the process exits; it holds nothing that needs
/// cleanup.
pub fn install_interrupt_handler(shutdown: Arc<Latch>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => {
                    println!("\n\nShutting down...");
                    shutdown.set();
                }
                Err(e) => log::warn!("pipeline: cannot listen for Ctrl-C: {e}"),
            }
        })?;

    Ok(())
}
