//! Debounce timer for resynthesis.
//!
//! Every `schedule` call supersedes the previous one: only the latest ticket
//! is current, and a timer whose ticket is stale when it wakes does nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::trace;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel any pending fire and start a new quiet period. `fire` runs on
    /// the timer thread with its ticket once the period elapses, unless
    /// superseded first. Receivers should recheck `is_current` before acting.
    pub fn schedule<F>(&self, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        thread::spawn(move || {
            thread::sleep(delay);
            if generation.load(Ordering::SeqCst) == ticket {
                fire(ticket);
            } else {
                trace!(ticket, "debounce ticket superseded");
            }
        });
        ticket
    }

    /// Drop the pending fire, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
