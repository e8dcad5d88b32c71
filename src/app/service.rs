//! Rig lifecycle — attach the actuators to a GPIO block, detach them.
//!
//! [`Rig::attach`] maps the registers, programs every pin as an output,
//! drives them low, brings up the display and starts the three actuators.
//! [`Rig::detach`] undoes all of it in reverse.
//!
//! ```text
//!                        ┌──────────────────────────┐
//!   ReadingSink ───────▶ │      ControlSurface      │
//!                        └──┬──────────┬──────────┬─┘
//!                           │ T        │ T        │ H
//!                           ▼          ▼          ▼
//!                  blink timer    alarm queue   display queue
//!                  (reads T)      AlarmPulse    DisplayRefresh
//!                           │          │          │
//!                           └──── Arc<GpioBank> ──┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info, warn};

use crate::app::control::{ControlSurface, SharedDisplay};
use crate::app::ports::DisplayPort;
use crate::app::readings::{ReadingSnapshot, Readings};
use crate::config::RigConfig;
use crate::drivers::buzzer::Alarm;
use crate::drivers::delay::SpinDelay;
use crate::drivers::gpio::{GpioBank, PinDescriptor, PinMask, RegisterPin};
use crate::drivers::lcd::{Lcd1602, LcdPins};
use crate::drivers::registers::RegisterMapper;
use crate::drivers::status_led::{BlinkBand, BlinkEngine, LedSet};
use crate::drivers::timer::RepeatingTimer;
use crate::error::{MapError, MapErrorKind, Result};
use crate::pins;
use crate::scheduler::{WorkQueue, Worker};

// ───────────────────────────────────────────────────────────────
// Status
// ───────────────────────────────────────────────────────────────

/// Point-in-time view of the rig, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigStatus {
    pub readings: ReadingSnapshot,
    pub band: BlinkBand,
    pub blink_running: bool,
    pub alarm_pending: bool,
    pub alarm_pulses: u64,
    pub alarm_faulted: bool,
    pub redraw_pending: bool,
}

// ───────────────────────────────────────────────────────────────
// Rig
// ───────────────────────────────────────────────────────────────

/// An attached rig.  Must be released with [`Rig::detach`].
pub struct Rig {
    gpio_base: u32,
    bank: Arc<GpioBank>,
    readings: Arc<Readings>,
    leds: LedSet,
    buzzer: PinDescriptor,
    blink: RepeatingTimer,
    alarm_worker: Worker,
    display_worker: Worker,
    display: SharedDisplay,
    control: ControlSurface,
}

/// Everything started after the display came up.
struct Running {
    blink: RepeatingTimer,
    alarm_worker: Worker,
    display_worker: Worker,
    control: ControlSurface,
}

impl Rig {
    /// Every pin the rig drives: LEDs, buzzer, then the display bus.
    pub fn board_pins() -> Vec<PinDescriptor> {
        LedSet::board()
            .pins()
            .into_iter()
            .chain([PinDescriptor::new(pins::BUZZER)])
            .chain(LcdPins::board().into_array())
            .collect()
    }

    /// The board display: an HD44780 on register-backed pins.
    pub fn board_display(bank: &Arc<GpioBank>) -> Box<dyn DisplayPort> {
        let pins = LcdPins::board().map(|pin| RegisterPin::new(Arc::clone(bank), pin));
        Box::new(Lcd1602::new(pins, SpinDelay::new()))
    }

    /// Bring the rig up on the GPIO block behind `mapper`.
    ///
    /// `make_display` builds the display on the freshly configured bank;
    /// the daemon passes [`Rig::board_display`].  On any failure every
    /// mapping made so far is released.
    pub fn attach<F>(mapper: &mut dyn RegisterMapper, config: &RigConfig, make_display: F) -> Result<Self>
    where
        F: FnOnce(&Arc<GpioBank>) -> Box<dyn DisplayPort>,
    {
        config.validate()?;
        let gpio_base = config.gpio_base();
        let leds = LedSet::board();
        let buzzer = PinDescriptor::new(pins::BUZZER);
        let pins = Self::board_pins();

        info!("rig: attaching at 0x{:08X} ({} pins)", gpio_base, pins.len());
        let mut bank = GpioBank::map(mapper, gpio_base, &pins, config.verify_writes)?;
        if let Err(e) = Self::configure(&mut bank, &pins) {
            error!("rig: pin setup failed: {}", e);
            bank.unmap(mapper);
            return Err(e);
        }

        let bank = Arc::new(bank);
        let readings = Arc::new(Readings::new());
        let display: SharedDisplay = Arc::new(Mutex::new(make_display(&bank)));

        match Self::start(&bank, &readings, &display, leds, buzzer, config) {
            Ok(running) => {
                info!("rig: attached");
                Ok(Self {
                    gpio_base,
                    bank,
                    readings,
                    leds,
                    buzzer,
                    blink: running.blink,
                    alarm_worker: running.alarm_worker,
                    display_worker: running.display_worker,
                    display,
                    control: running.control,
                })
            }
            Err(e) => {
                error!("rig: start failed: {}", e);
                drop(display);
                if let Err(release) = Self::release(bank, gpio_base, mapper) {
                    warn!("rig: {}", release);
                }
                Err(e)
            }
        }
    }

    /// Program each pin as an output, one at a time, then drive all low.
    fn configure(bank: &mut GpioBank, pins: &[PinDescriptor]) -> Result<()> {
        let mut all = PinMask::EMPTY;
        for pin in pins {
            bank.configure_as_output(*pin)?;
            all |= pin.mask();
        }
        bank.clear(all)
    }

    fn start(
        bank: &Arc<GpioBank>,
        readings: &Arc<Readings>,
        display: &SharedDisplay,
        leds: LedSet,
        buzzer: PinDescriptor,
        config: &RigConfig,
    ) -> Result<Running> {
        display.lock().unwrap_or_else(PoisonError::into_inner).init()?;

        let alarm_queue = WorkQueue::new("alarm");
        let alarm_worker = alarm_queue.spawn()?;
        let display_queue = WorkQueue::new("display");
        let display_worker = display_queue.spawn()?;

        let alarm = Alarm::new(
            Arc::clone(bank),
            buzzer,
            Arc::clone(readings),
            config.alarm_pulse_us,
            SpinDelay::new(),
            alarm_queue,
        );
        let control = ControlSurface::new(Arc::clone(readings), alarm, Arc::clone(display), display_queue);

        let blink = BlinkEngine::new(leds).start(
            Arc::clone(bank),
            Arc::clone(readings),
            Duration::from_millis(u64::from(config.blink_period_ms)),
        )?;

        Ok(Running {
            blink,
            alarm_worker,
            display_worker,
            control,
        })
    }

    fn release(bank: Arc<GpioBank>, gpio_base: u32, mapper: &mut dyn RegisterMapper) -> Result<()> {
        match Arc::try_unwrap(bank) {
            Ok(bank) => {
                bank.unmap(mapper);
                Ok(())
            }
            Err(bank) => {
                error!(
                    "rig: GPIO bank still has {} other user(s), registers left mapped",
                    Arc::strong_count(&bank) - 1
                );
                Err(MapError::new(gpio_base, MapErrorKind::InUse).into())
            }
        }
    }

    /// Stop every actuator, leave the outputs low and the display blank,
    /// and release the registers.
    ///
    /// A pulse or redraw already running finishes; nothing queued runs.
    /// The registers are released even if clearing the outputs fails; the
    /// first error is returned.
    pub fn detach(self, mapper: &mut dyn RegisterMapper) -> Result<()> {
        let Self {
            gpio_base,
            bank,
            readings: _,
            leds,
            buzzer,
            blink,
            alarm_worker,
            display_worker,
            display,
            control,
        } = self;
        info!("rig: detaching");

        blink.cancel();
        alarm_worker.join();
        display_worker.join();
        drop(control);

        let outputs = bank.clear(leds.all() | buzzer.mask());
        if let Err(e) = &outputs {
            error!("rig: outputs not cleared: {}", e);
        }
        let blank = display.lock().unwrap_or_else(PoisonError::into_inner).shutdown();
        if let Err(e) = &blank {
            error!("rig: display not cleared: {}", e);
        }
        drop(display);

        let released = Self::release(bank, gpio_base, mapper);
        info!("rig: detached");
        outputs.and(blank).and(released)
    }

    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    pub fn readings(&self) -> &Arc<Readings> {
        &self.readings
    }

    pub fn snapshot(&self) -> RigStatus {
        let readings = self.readings.snapshot();
        let alarm = self.control.alarm();
        RigStatus {
            readings,
            band: BlinkBand::from_temperature(readings.temperature),
            blink_running: self.blink.is_running(),
            alarm_pending: alarm.is_pending(),
            alarm_pulses: alarm.pulses(),
            alarm_faulted: alarm.is_faulted(),
            redraw_pending: self.control.redraw_pending(),
        }
    }
}
