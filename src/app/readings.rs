//! Latest sensor readings shared by every actuator.

use std::sync::atomic::{AtomicI32, Ordering};

/// Temperature (°C) and relative humidity (%) as last written through the
/// control surface.  Both start at zero.
///
/// Each field is a single atomic word, so a reader sees either the old or
/// the new value of a field and never a torn one.  The two fields are not
/// updated together.
#[derive(Debug, Default)]
pub struct Readings {
    temperature: AtomicI32,
    humidity: AtomicI32,
}

/// A copy of both readings taken at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingSnapshot {
    pub temperature: i32,
    pub humidity: i32,
}

impl Readings {
    pub const fn new() -> Self {
        Self {
            temperature: AtomicI32::new(0),
            humidity: AtomicI32::new(0),
        }
    }

    pub fn temperature(&self) -> i32 {
        self.temperature.load(Ordering::Acquire)
    }

    pub fn humidity(&self) -> i32 {
        self.humidity.load(Ordering::Acquire)
    }

    pub fn set_temperature(&self, value: i32) {
        self.temperature.store(value, Ordering::Release);
    }

    pub fn set_humidity(&self, value: i32) {
        self.humidity.store(value, Ordering::Release);
    }

    pub fn snapshot(&self) -> ReadingSnapshot {
        ReadingSnapshot {
            temperature: self.temperature(),
            humidity: self.humidity(),
        }
    }
}
