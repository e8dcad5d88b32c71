//! Rig configuration parameters
//!
//! All tunable parameters for the monitoring rig.  Loaded from a JSON file
//! when the daemon is given one; every field falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pins;

/// Longest alarm phase accepted.  Longer phases stop sounding like a tone.
const MAX_ALARM_PULSE_US: u32 = 100_000;
/// Shortest blink period accepted.
const MIN_BLINK_PERIOD_MS: u32 = 10;

/// Core rig configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    // --- Hardware ---
    /// Physical peripheral base (BCM2710 = 0x3F00_0000, BCM2711 = 0xFE00_0000)
    pub peripheral_base: u32,
    /// Character device mapped by the hardware backend
    pub mem_device: String,
    /// Read back the level register after every set/clear
    pub verify_writes: bool,

    // --- Timing ---
    /// Status light blink period (milliseconds)
    pub blink_period_ms: u32,
    /// Alarm high and low phase length (microseconds)
    pub alarm_pulse_us: u32,
    /// Sensor poll interval (milliseconds)
    pub poll_interval_ms: u32,

    // --- Sensor ---
    /// Text file holding the latest temperature
    pub temperature_path: String,
    /// Text file holding the latest relative humidity
    pub humidity_path: String,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            // Hardware
            peripheral_base: 0x3F00_0000,
            mem_device: "/dev/gpiomem".into(),
            verify_writes: false,

            // Timing
            blink_period_ms: 500,  // 1 Hz blink
            alarm_pulse_us: 1000,  // 500 Hz tone
            poll_interval_ms: 5000,

            // Sensor
            temperature_path: "/sys/bus/iio/devices/iio:device0/in_temp_input".into(),
            humidity_path: "/sys/bus/iio/devices/iio:device0/in_humidityrelative_input".into(),
        }
    }
}

impl RigConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would wedge an actuator.
    pub fn validate(&self) -> Result<()> {
        if self.blink_period_ms < MIN_BLINK_PERIOD_MS {
            return Err(Error::Config("blink_period_ms must be at least 10"));
        }
        if self.alarm_pulse_us == 0 {
            return Err(Error::Config("alarm_pulse_us must be non-zero"));
        }
        if self.alarm_pulse_us > MAX_ALARM_PULSE_US {
            return Err(Error::Config("alarm_pulse_us must not exceed 100000"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be non-zero"));
        }
        if self.peripheral_base & 0xFFF != 0 {
            return Err(Error::Config("peripheral_base must be page aligned"));
        }
        if self
            .peripheral_base
            .checked_add(pins::GPIO_BLOCK_OFFSET + pins::GPLEV0)
            .is_none()
        {
            return Err(Error::Config("peripheral_base leaves no room for the GPIO block"));
        }
        Ok(())
    }

    /// Physical address of the GPIO block.  Wraps on a base that
    /// [`validate`](Self::validate) rejects.
    pub fn gpio_base(&self) -> u32 {
        self.peripheral_base.wrapping_add(pins::GPIO_BLOCK_OFFSET)
    }
}
