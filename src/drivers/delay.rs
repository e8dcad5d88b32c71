//! Blocking delays for bus timing on a Linux host.
//!
//! Millisecond-class waits sleep the thread; anything shorter spins on the
//! monotonic clock, since scheduler wake-up latency dwarfs a 1–2 µs
//! enable-pulse budget.  Neither kind is a suspension point: a pulse or a
//! nibble transfer in progress always runs to completion.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

/// Waits at or above this length sleep instead of spinning.
const SLEEP_THRESHOLD_NS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDelay;

impl SpinDelay {
    pub fn new() -> Self {
        Self
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let wait = Duration::from_nanos(u64::from(ns));
        if ns >= SLEEP_THRESHOLD_NS {
            std::thread::sleep(wait);
            return;
        }
        let start = Instant::now();
        while start.elapsed() < wait {
            core::hint::spin_loop();
        }
    }
}
