//! Tri-colour status light.
//!
//! Red, yellow and green LEDs on their own GPIOs.  A repeating timer calls
//! [`BlinkEngine::tick`] once per half period; ticks alternate between an
//! on-phase, which lights the LED for the current temperature band, and an
//! off-phase, which clears all three.
//!
//! | temperature | band     | lit on the on-phase |
//! |-------------|----------|---------------------|
//! | `T < 0`     | Unlit    | nothing             |
//! | `T == 0`    | AllOn    | red, yellow, green  |
//! | `0 < T ≤ 25`| Green    | green               |
//! | `25 < T ≤ 30`| Yellow  | yellow              |
//! | `T > 30`    | Red      | red                 |
//!
//! Zero is the power-on value, so "all on" doubles as a lamp test until the
//! first real reading arrives.

use core::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::app::readings::Readings;
use crate::drivers::gpio::{GpioBank, PinDescriptor, PinMask};
use crate::drivers::timer::RepeatingTimer;
use crate::error::{Error, Result};
use crate::pins;

/// Upper bound (inclusive) of the green band.
pub const GREEN_MAX: i32 = 25;
/// Upper bound (inclusive) of the yellow band.
pub const YELLOW_MAX: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkBand {
    /// Below freezing: nothing lights.
    Unlit,
    /// No reading yet (or exactly 0 °C): every LED lights.
    AllOn,
    Green,
    Yellow,
    Red,
}

impl BlinkBand {
    pub const fn from_temperature(t: i32) -> Self {
        match t {
            i32::MIN..=-1 => Self::Unlit,
            0 => Self::AllOn,
            1..=GREEN_MAX => Self::Green,
            26..=YELLOW_MAX => Self::Yellow,
            _ => Self::Red,
        }
    }
}

/// The three LED pins.
#[derive(Debug, Clone, Copy)]
pub struct LedSet {
    pub red: PinDescriptor,
    pub yellow: PinDescriptor,
    pub green: PinDescriptor,
}

impl LedSet {
    /// The board wiring.
    pub const fn board() -> Self {
        Self {
            red: PinDescriptor::new(pins::LED_RED),
            yellow: PinDescriptor::new(pins::LED_YELLOW),
            green: PinDescriptor::new(pins::LED_GREEN),
        }
    }

    pub fn all(&self) -> PinMask {
        self.red.mask() | self.yellow.mask() | self.green.mask()
    }

    pub fn pins(&self) -> [PinDescriptor; 3] {
        [self.red, self.yellow, self.green]
    }

    /// LEDs lit on the on-phase of `band`.
    pub fn lit(&self, band: BlinkBand) -> PinMask {
        match band {
            BlinkBand::Unlit => PinMask::EMPTY,
            BlinkBand::AllOn => self.all(),
            BlinkBand::Green => self.green.mask(),
            BlinkBand::Yellow => self.yellow.mask(),
            BlinkBand::Red => self.red.mask(),
        }
    }
}

/// Blink state: which phase comes next and which band was shown last.
#[derive(Debug)]
pub struct BlinkEngine {
    leds: LedSet,
    on: bool,
    band: Option<BlinkBand>,
}

impl BlinkEngine {
    pub fn new(leds: LedSet) -> Self {
        Self {
            leds,
            on: false,
            band: None,
        }
    }

    /// Advance one half period.  The first tick is an on-phase.
    pub fn tick(&mut self, bank: &GpioBank, temperature: i32) -> Result<BlinkBand> {
        self.on = !self.on;
        let band = BlinkBand::from_temperature(temperature);
        if self.band != Some(band) {
            info!("blink: band {:?} (T={})", band, temperature);
            self.band = Some(band);
        }

        if self.on {
            let lit = self.leds.lit(band);
            if !lit.is_empty() {
                bank.set(lit)?;
            }
        } else {
            bank.clear(self.leds.all())?;
        }
        Ok(band)
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Band shown by the most recent tick.
    pub fn band(&self) -> Option<BlinkBand> {
        self.band
    }

    /// Run this engine on a repeating timer, reading the temperature fresh
    /// on every tick.  A hardware fault stops the timer.
    pub fn start(
        mut self,
        bank: Arc<GpioBank>,
        readings: Arc<Readings>,
        period: Duration,
    ) -> Result<RepeatingTimer> {
        RepeatingTimer::start("blink", period, move || {
            match self.tick(&bank, readings.temperature()) {
                Ok(_) => ControlFlow::Continue(()),
                Err(e) => {
                    error!("blink: {}, blinking stopped", e);
                    ControlFlow::Break(())
                }
            }
        })
        .map_err(|e| {
            error!("blink: timer start failed: {}", e);
            Error::Spawn("blink")
        })
    }
}
