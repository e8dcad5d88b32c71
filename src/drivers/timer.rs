//! Cancellable periodic timer.
//!
//! A dedicated thread waits one period, runs the tick callback, and repeats
//! until either the callback breaks out or the timer is cancelled.  The
//! wait is a condvar timeout, so [`RepeatingTimer::cancel`] wakes the thread
//! immediately instead of letting it sleep out the rest of the period.
//!
//! Cancellation is a single deterministic call: when `cancel` returns the
//! thread has exited and the callback will never run again.  A tick that is
//! already running when cancellation is requested finishes first.

use core::ops::ControlFlow;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::drivers::task::{WORKER_STACK_KB, spawn_worker};

#[derive(Default)]
struct CancelToken {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    /// Sleep until `deadline` or cancellation.  Returns `true` if cancelled.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            cancelled = self
                .wake
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running periodic timer.  Dropping it cancels the timer.
pub struct RepeatingTimer {
    name: &'static str,
    token: Arc<CancelToken>,
    thread: Option<JoinHandle<()>>,
}

impl RepeatingTimer {
    /// Start firing `tick` every `period`, first after one full period.
    pub fn start<F>(name: &'static str, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let token = Arc::new(CancelToken::default());
        let thread_token = Arc::clone(&token);

        let thread = spawn_worker(name, WORKER_STACK_KB, move || {
            let mut deadline = Instant::now() + period;
            loop {
                if thread_token.wait_until(deadline) {
                    break;
                }
                if tick().is_break() {
                    warn!("timer '{}': tick requested stop", name);
                    break;
                }
                deadline += period;
                // Never try to catch up on missed ticks.
                let now = Instant::now();
                if deadline < now {
                    deadline = now + period;
                }
            }
            debug!("timer '{}': thread exit", name);
        })?;

        info!("timer '{}': started ({}ms period)", name, period.as_millis());
        Ok(Self {
            name,
            token,
            thread: Some(thread),
        })
    }

    /// Whether the timer thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the timer and wait for its thread to exit.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.token.cancel();
        if thread.join().is_err() {
            warn!("timer '{}': tick panicked", self.name);
        }
        info!("timer '{}': cancelled", self.name);
    }

    #[cfg(test)]
    fn cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
