//! Orchestrator: sample the sensor, forward the readings.
//!
//! Each poll forwards temperature first, then humidity, so the display
//! redraw triggered by the humidity write already sees the new temperature.

use std::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{ReadingSink, SensorPort};
use crate::error::{Error, Result};

/// Which readings of one poll the control surface accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub temperature_accepted: bool,
    pub humidity_accepted: bool,
}

pub struct Poller<S, R> {
    sensor: S,
    sink: R,
    polls: u64,
}

impl<S: SensorPort, R: ReadingSink> Poller<S, R> {
    pub fn new(sensor: S, sink: R) -> Self {
        Self {
            sensor,
            sink,
            polls: 0,
        }
    }

    /// Completed polls.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Take one sample and forward it.
    ///
    /// A sensor failure is returned; a rejected reading is logged and the
    /// other reading is still forwarded.
    pub fn poll_once(&mut self) -> Result<PollOutcome> {
        let sample = self.sensor.read()?;
        let temperature_accepted = Self::forward("temperature", self.sink.set_temperature(&sample.temperature))?;
        let humidity_accepted = Self::forward("humidity", self.sink.set_humidity(&sample.humidity))?;
        self.polls += 1;
        debug!("poller: poll #{} T={:?} H={:?}", self.polls, sample.temperature, sample.humidity);
        Ok(PollOutcome {
            temperature_accepted,
            humidity_accepted,
        })
    }

    fn forward(field: &str, result: Result<usize>) -> Result<bool> {
        match result {
            Ok(_) => Ok(true),
            Err(Error::InvalidInput(e)) => {
                warn!("poller: {} reading dropped: {}", field, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Sleep `interval`, poll, repeat.  Stops after `max_polls` polls if
    /// given, or at the first sensor failure.
    pub fn run(&mut self, interval: Duration, max_polls: Option<u64>) -> Result<u64> {
        info!(
            "poller: every {}ms{}",
            interval.as_millis(),
            max_polls.map(|n| format!(", {n} poll(s)")).unwrap_or_default()
        );
        while max_polls.is_none_or(|max| self.polls < max) {
            std::thread::sleep(interval);
            self.poll_once()?;
        }
        Ok(self.polls)
    }
}
