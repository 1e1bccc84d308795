//! Signal handling for investigations
//!
//! The first Ctrl+C cancels the running investigation instead of killing
//! the process. A second one within two seconds exits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::Result;

const DOUBLE_PRESS_WINDOW: Duration = Duration::from_secs(2);

/// Exit status used after a second Ctrl+C
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Turns Ctrl+C into a cancellation signal
pub struct SignalHandler {
    cancel: Arc<watch::Sender<bool>>,
    interrupt_count: Arc<AtomicUsize>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
            interrupt_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Install the process-wide Ctrl+C handler
    pub fn install(&self) -> Result<()> {
        let cancel = self.cancel.clone();
        let interrupt_count = self.interrupt_count.clone();

        ctrlc::set_handler(move || {
            let count = interrupt_count.fetch_add(1, Ordering::SeqCst);

            if count == 0 {
                debug!("First interrupt received");
                cancel.send_replace(true);

                // A second press only counts if it comes quickly
                let count_clone = interrupt_count.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(DOUBLE_PRESS_WINDOW);
                    count_clone.store(0, Ordering::SeqCst);
                });
            } else {
                info!("Second interrupt received, exiting");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
        .map_err(|e| crate::Error::Config(format!("Failed to set signal handler: {}", e)))?;

        Ok(())
    }

    /// Receiver to hand to an [`AgentLoop`](crate::AgentLoop)
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Request cancellation without a signal
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Clear a pending cancellation before starting a new investigation
    pub fn reset(&self) {
        self.cancel.send_replace(false);
        self.interrupt_count.store(0, Ordering::SeqCst);
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a panic handler that prints a readable report
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        let location = if let Some(loc) = info.location() {
            format!(" at {}:{}", loc.file(), loc.line())
        } else {
            String::new()
        };

        eprintln!("\n\x1b[31m╭────────────────────────────────────────╮\x1b[0m");
        eprintln!("\x1b[31m│  sleuth crashed unexpectedly           │\x1b[0m");
        eprintln!("\x1b[31m╰────────────────────────────────────────╯\x1b[0m");
        eprintln!("\n\x1b[33mError:\x1b[0m {}{}\n", msg, location);
        eprintln!("The debugged program may still be running under gdb.");
    }));
}
