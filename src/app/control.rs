//! Control surface: the two writable readings.
//!
//! Each write carries ASCII text holding one base-10 integer.  A valid
//! write updates the stored reading and triggers the actuator that depends
//! on it:
//!
//! - temperature → alarm re-evaluation (the blink timer picks it up on its
//!   next tick without being told)
//! - humidity → display redraw, deferred to the display worker
//!
//! A rejected write changes nothing.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, warn};

use crate::app::ports::{DisplayPort, ReadingSink};
use crate::app::readings::Readings;
use crate::drivers::buzzer::Alarm;
use crate::drivers::lcd::DisplayLines;
use crate::error::{InputError, Result};
use crate::scheduler::{Continuation, Work, WorkItem, WorkQueue};

/// The display as shared between the redraw job and rig teardown.
pub type SharedDisplay = Arc<Mutex<Box<dyn DisplayPort>>>;

/// Parse one reading: optional sign, decimal digits, and at most one
/// trailing newline.  Anything else is rejected, including values that do
/// not fit an `i32`.
pub fn parse_reading(text: &str) -> core::result::Result<i32, InputError> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.is_empty() {
        return Err(InputError::Empty);
    }
    let digits = body.strip_prefix(['+', '-']).unwrap_or(body);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::NotANumber);
    }
    // Only sign and digits remain, so the sole failure left is overflow.
    body.parse().map_err(|_| InputError::OutOfRange)
}

/// Redraws the display from the current readings.
struct DisplayRefresh {
    display: SharedDisplay,
    readings: Arc<Readings>,
}

impl Work for DisplayRefresh {
    fn run(&self) -> Continuation {
        let snap = self.readings.snapshot();
        let lines = DisplayLines::readings(snap.temperature, snap.humidity);
        let mut display = self.display.lock().unwrap_or_else(PoisonError::into_inner);
        match display.show(&lines) {
            Ok(()) => debug!("display: T={} H={}", snap.temperature, snap.humidity),
            Err(e) => error!("display: redraw failed: {}", e),
        }
        Continuation::Done
    }
}

pub struct ControlSurface {
    readings: Arc<Readings>,
    alarm: Alarm,
    display_queue: Arc<WorkQueue>,
    refresh: Arc<WorkItem>,
}

impl ControlSurface {
    pub fn new(
        readings: Arc<Readings>,
        alarm: Alarm,
        display: SharedDisplay,
        display_queue: Arc<WorkQueue>,
    ) -> Self {
        let refresh = WorkItem::new(
            "display-refresh",
            DisplayRefresh {
                display,
                readings: Arc::clone(&readings),
            },
        );
        Self {
            readings,
            alarm,
            display_queue,
            refresh,
        }
    }

    pub fn temperature(&self) -> i32 {
        self.readings.temperature()
    }

    pub fn humidity(&self) -> i32 {
        self.readings.humidity()
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    /// A redraw is queued and not yet running.
    pub fn redraw_pending(&self) -> bool {
        self.refresh.is_pending()
    }

    fn parse(field: &str, text: &str) -> Result<i32> {
        parse_reading(text).map_err(|e| {
            warn!("control: {} write {:?} rejected: {}", field, text, e);
            e.into()
        })
    }
}

impl ReadingSink for ControlSurface {
    fn set_temperature(&self, text: &str) -> Result<usize> {
        let value = Self::parse("temperature", text)?;
        self.readings.set_temperature(value);
        self.alarm.evaluate();
        Ok(text.len())
    }

    fn set_humidity(&self, text: &str) -> Result<usize> {
        let value = Self::parse("humidity", text)?;
        self.readings.set_humidity(value);
        self.display_queue.submit(&self.refresh);
        Ok(text.len())
    }
}
