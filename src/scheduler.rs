//! Deferred-work queues.
//!
//! Actuator work (an alarm pulse, a display redraw) never runs on the
//! caller's thread.  It is submitted to a [`WorkQueue`] and executed by that
//! queue's single worker, so items of one queue are strictly sequential.
//!
//! ```text
//!   submit(item) ──► pending? ──yes──► dropped (already queued)
//!                        │
//!                        no
//!                        ▼
//!                 ┌─────────────┐    take    ┌──────────┐
//!                 │ ring buffer │ ─────────► │  worker  │── run() ──┐
//!                 └─────────────┘            └──────────┘           │
//!                        ▲                                          │
//!                        └────────── Reschedule (unless shut down) ─┘
//! ```
//!
//! Each [`WorkItem`] is queued at most once at any instant.  Its pending flag
//! is cleared when the worker picks it up, so a submission made while the
//! item is running queues exactly one further run.
//!
//! [`WorkQueue::shutdown`] stops new submissions, drops whatever is queued
//! and refuses reschedules.  An item already running finishes its run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use heapless::Deque;
use log::{debug, error, info, warn};

use crate::drivers::task::{WORKER_STACK_KB, spawn_worker};
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════
//  Work items
// ═══════════════════════════════════════════════════════════════

/// What a work item wants after one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Finished; run again only if resubmitted.
    Done,
    /// Queue another run behind whatever is already waiting.
    Reschedule,
}

/// A unit of deferred work.
pub trait Work: Send + Sync {
    fn run(&self) -> Continuation;
}

/// A [`Work`] plus its "already queued" flag.
pub struct WorkItem {
    label: &'static str,
    pending: AtomicBool,
    work: Box<dyn Work>,
}

impl WorkItem {
    pub fn new(label: &'static str, work: impl Work + 'static) -> Arc<Self> {
        Arc::new(Self {
            label,
            pending: AtomicBool::new(false),
            work: Box::new(work),
        })
    }

    /// Queued and not yet picked up by a worker.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl core::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkItem")
            .field("label", &self.label)
            .field("pending", &self.is_pending())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Queue
// ═══════════════════════════════════════════════════════════════

/// Items one queue can hold at once.  Each item occupies at most one slot.
const MAX_QUEUED: usize = 8;

struct QueueState {
    items: Deque<Arc<WorkItem>, MAX_QUEUED>,
    running: bool,
    shut_down: bool,
}

pub struct WorkQueue {
    label: &'static str,
    state: Mutex<QueueState>,
    /// Signalled when an item is queued or the queue shuts down.
    ready: Condvar,
    /// Signalled when a run finishes.
    idle: Condvar,
}

impl WorkQueue {
    pub fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            state: Mutex::new(QueueState {
                items: Deque::new(),
                running: false,
                shut_down: false,
            }),
            ready: Condvar::new(),
            idle: Condvar::new(),
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `item` unless it is already pending or the queue is shut down.
    ///
    /// Returns `true` if this call queued it.
    pub fn submit(&self, item: &Arc<WorkItem>) -> bool {
        let mut state = self.lock();
        let queued = self.enqueue(&mut state, item);
        if queued {
            self.ready.notify_one();
        }
        queued
    }

    fn enqueue(&self, state: &mut QueueState, item: &Arc<WorkItem>) -> bool {
        if state.shut_down {
            debug!("{}: shut down, '{}' not queued", self.label, item.label);
            return false;
        }
        if item.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        if state.items.push_back(Arc::clone(item)).is_err() {
            item.pending.store(false, Ordering::Release);
            error!("{}: queue full, '{}' dropped", self.label, item.label);
            return false;
        }
        true
    }

    /// Pop the oldest item, clearing its pending flag.  With `block`, wait
    /// for one to arrive; returns `None` once the queue is shut down.
    fn take(&self, block: bool) -> Option<Arc<WorkItem>> {
        let mut state = self.lock();
        loop {
            if state.shut_down {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                item.pending.store(false, Ordering::Release);
                state.running = true;
                return Some(item);
            }
            if !block {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self, item: &Arc<WorkItem>, outcome: Continuation) {
        let mut state = self.lock();
        state.running = false;
        if outcome == Continuation::Reschedule && !self.enqueue(&mut state, item) {
            debug!("{}: '{}' not rescheduled", self.label, item.label);
        }
        self.ready.notify_one();
        self.idle.notify_all();
    }

    /// Run the oldest queued item on the calling thread.
    ///
    /// Returns `None` if nothing was queued.  This is what the worker thread
    /// does in a loop; calling it directly drives a queue without a worker.
    pub fn run_one(&self) -> Option<Continuation> {
        let item = self.take(false)?;
        let outcome = item.work.run();
        self.finish(&item, outcome);
        Some(outcome)
    }

    /// Number of items waiting to run.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Wait until nothing is queued or running.  Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.running || !state.items.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .idle
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Refuse further submissions and reschedules and drop queued items.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        let mut dropped = 0usize;
        while let Some(item) = state.items.pop_front() {
            item.pending.store(false, Ordering::Release);
            dropped += 1;
        }
        self.ready.notify_all();
        self.idle.notify_all();
        info!("{}: shut down ({} queued item(s) dropped)", self.label, dropped);
    }

    /// Start the worker thread that drains this queue.
    pub fn spawn(self: &Arc<Self>) -> Result<Worker> {
        let queue = Arc::clone(self);
        let thread = spawn_worker(self.label, WORKER_STACK_KB, move || {
            while let Some(item) = queue.take(true) {
                let outcome = item.work.run();
                queue.finish(&item, outcome);
            }
            debug!("{}: worker exit", queue.label);
        })
        .map_err(|e| {
            error!("{}: worker spawn failed: {}", self.label, e);
            Error::Spawn(self.label)
        })?;

        Ok(Worker {
            queue: Arc::clone(self),
            thread: Some(thread),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Worker handle
// ═══════════════════════════════════════════════════════════════

/// Owns a queue's worker thread.  Dropping it shuts the queue down and
/// joins the thread.
pub struct Worker {
    queue: Arc<WorkQueue>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Shut the queue down and wait for an in-flight run to finish.
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.queue.shutdown();
        if thread.join().is_err() {
            warn!("{}: work item panicked", self.queue.label);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
