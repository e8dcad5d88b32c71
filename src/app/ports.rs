//! Port traits — the boundary between the rig core and the outside world.
//!
//! ```text
//!   sensor ──▶ SensorPort ──▶ Poller ──▶ ReadingSink ──▶ ControlSurface
//!                                                           │
//!                                 Lcd1602 ◀── DisplayPort ◀─┘
//! ```
//!
//! The sensor and the display are driven adapters; the core only ever sees
//! these traits, so every path is testable without the board.

use crate::drivers::lcd::DisplayLines;
use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: sensor → rig)
// ───────────────────────────────────────────────────────────────

/// One raw sample: the text the sensor reported, trailing newline removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorSample {
    pub temperature: String,
    pub humidity: String,
}

/// Source of temperature/humidity samples.
pub trait SensorPort {
    /// Take a fresh sample.  An error ends polling.
    fn read(&mut self) -> Result<SensorSample>;
}

// ───────────────────────────────────────────────────────────────
// Reading sink (driving side: poller → control surface)
// ───────────────────────────────────────────────────────────────

/// Accepts readings as text, the way a sysfs attribute does.
///
/// On success the whole input is consumed and its length returned.
pub trait ReadingSink {
    fn set_temperature(&self, text: &str) -> Result<usize>;
    fn set_humidity(&self, text: &str) -> Result<usize>;
}

impl<T: ReadingSink + ?Sized> ReadingSink for &T {
    fn set_temperature(&self, text: &str) -> Result<usize> {
        (**self).set_temperature(text)
    }

    fn set_humidity(&self, text: &str) -> Result<usize> {
        (**self).set_humidity(text)
    }
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: rig → character display)
// ───────────────────────────────────────────────────────────────

/// A two-line character display.
pub trait DisplayPort: Send {
    /// Bring the display up and show placeholder text.
    fn init(&mut self) -> Result<()>;

    /// Replace both lines.
    fn show(&mut self, lines: &DisplayLines) -> Result<()>;

    /// Blank the display before the rig lets go of it.
    fn shutdown(&mut self) -> Result<()>;
}

impl<T: DisplayPort + ?Sized> DisplayPort for Box<T> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn show(&mut self, lines: &DisplayLines) -> Result<()> {
        (**self).show(lines)
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}
