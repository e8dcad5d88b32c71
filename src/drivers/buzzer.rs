//! Over-temperature alarm on a piezo buzzer.
//!
//! The buzzer is a self-rescheduling square-wave oscillator.  One run of
//! [`AlarmPulse`] drives the pin high for one phase and low for one phase,
//! then requeues itself while the temperature stays above
//! [`ALARM_THRESHOLD`].  A drop to the threshold or below stops it at the
//! end of the current pulse.
//!
//! Pulses execute on the alarm's own work queue, never on the thread that
//! wrote the temperature.  Because a work item is queued at most once,
//! re-triggering [`Alarm::evaluate`] while the oscillator runs does not
//! start a second one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use crate::app::readings::Readings;
use crate::drivers::gpio::{GpioBank, PinDescriptor};
use crate::error::Result;
use crate::scheduler::{Continuation, Work, WorkItem, WorkQueue};

/// Temperatures strictly above this sound the alarm.
pub const ALARM_THRESHOLD: i32 = 30;

pub const fn alarm_active(temperature: i32) -> bool {
    temperature > ALARM_THRESHOLD
}

#[derive(Debug, Default)]
struct AlarmStats {
    pulses: AtomicU64,
    faulted: AtomicBool,
}

/// One oscillator period: high phase, low phase.
pub struct AlarmPulse {
    bank: Arc<GpioBank>,
    pin: PinDescriptor,
    readings: Arc<Readings>,
    phase_us: u32,
    delay: Mutex<Box<dyn DelayNs + Send>>,
    stats: Arc<AlarmStats>,
}

impl AlarmPulse {
    fn pulse(&self) -> Result<()> {
        let mut delay = self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        let mask = self.pin.mask();
        self.bank.set(mask)?;
        delay.delay_us(self.phase_us);
        self.bank.clear(mask)?;
        delay.delay_us(self.phase_us);
        Ok(())
    }
}

impl Work for AlarmPulse {
    fn run(&self) -> Continuation {
        if let Err(e) = self.pulse() {
            error!("alarm: {}, oscillator stopped", e);
            self.stats.faulted.store(true, Ordering::Release);
            return Continuation::Done;
        }
        self.stats.pulses.fetch_add(1, Ordering::Relaxed);

        let t = self.readings.temperature();
        if alarm_active(t) {
            Continuation::Reschedule
        } else {
            info!("alarm: silenced (T={})", t);
            Continuation::Done
        }
    }
}

/// Front end for the alarm oscillator.
pub struct Alarm {
    item: Arc<WorkItem>,
    queue: Arc<WorkQueue>,
    readings: Arc<Readings>,
    stats: Arc<AlarmStats>,
}

impl Alarm {
    /// Build the alarm for `pin`.  Pulses run on `queue`.
    pub fn new(
        bank: Arc<GpioBank>,
        pin: PinDescriptor,
        readings: Arc<Readings>,
        phase_us: u32,
        delay: impl DelayNs + Send + 'static,
        queue: Arc<WorkQueue>,
    ) -> Self {
        let stats = Arc::new(AlarmStats::default());
        let item = WorkItem::new(
            "alarm-pulse",
            AlarmPulse {
                bank,
                pin,
                readings: Arc::clone(&readings),
                phase_us,
                delay: Mutex::new(Box::new(delay)),
                stats: Arc::clone(&stats),
            },
        );
        Self {
            item,
            queue,
            readings,
            stats,
        }
    }

    /// Start the oscillator if the current temperature calls for it.
    ///
    /// Returns `true` if this call queued a pulse.  Already pending, below
    /// threshold, shut down and faulted all return `false`.
    pub fn evaluate(&self) -> bool {
        let t = self.readings.temperature();
        if !alarm_active(t) {
            return false;
        }
        if self.is_faulted() {
            debug!("alarm: faulted, T={} ignored", t);
            return false;
        }
        let queued = self.queue.submit(&self.item);
        if queued {
            info!("alarm: sounding (T={})", t);
        }
        queued
    }

    /// A pulse is queued and not yet running.
    pub fn is_pending(&self) -> bool {
        self.item.is_pending()
    }

    /// Completed oscillator periods since construction.
    pub fn pulses(&self) -> u64 {
        self.stats.pulses.load(Ordering::Relaxed)
    }

    /// A stuck output was detected; the alarm will not restart.
    pub fn is_faulted(&self) -> bool {
        self.stats.faulted.load(Ordering::Acquire)
    }
}
