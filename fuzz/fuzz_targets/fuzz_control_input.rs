//! Fuzz target: control-surface writes
//!
//! Feeds arbitrary text to `parse_reading` and to a live `ControlSurface`
//! on a simulated GPIO block.
//!
//! Invariants checked:
//! - No panics under any input
//! - A rejected write leaves both readings unchanged
//! - An accepted write stores exactly what `parse_reading` returned and
//!   reports the full input length
//!
//! cargo fuzz run fuzz_control_input

#![no_main]

use std::sync::{Arc, Mutex};

use envmon::app::control::{ControlSurface, parse_reading};
use envmon::app::ports::{DisplayPort, ReadingSink};
use envmon::app::readings::Readings;
use envmon::drivers::buzzer::Alarm;
use envmon::drivers::gpio::{GpioBank, PinDescriptor};
use envmon::drivers::lcd::DisplayLines;
use envmon::drivers::registers::{SimMapper, SimMemory};
use envmon::error::Result;
use envmon::pins;
use envmon::scheduler::WorkQueue;
use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;

const BASE: u32 = 0x3F20_0000;

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

struct NullDisplay;

impl DisplayPort for NullDisplay {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn show(&mut self, _lines: &DisplayLines) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mem = SimMemory::new(BASE);
    let mut mapper = SimMapper::new(Arc::clone(&mem));
    let buzzer = PinDescriptor::new(pins::BUZZER);
    let bank = Arc::new(GpioBank::map(&mut mapper, BASE, &[buzzer], false).unwrap());
    let readings = Arc::new(Readings::new());
    readings.set_temperature(7);
    readings.set_humidity(8);

    // Queues are never drained: writes only ever enqueue.
    let alarm = Alarm::new(bank, buzzer, Arc::clone(&readings), 1, NoDelay, WorkQueue::new("alarm"));
    let display: Box<dyn DisplayPort> = Box::new(NullDisplay);
    let control = ControlSurface::new(
        Arc::clone(&readings),
        alarm,
        Arc::new(Mutex::new(display)),
        WorkQueue::new("display"),
    );

    let parsed = parse_reading(text);
    match control.set_temperature(text) {
        Ok(n) => {
            assert_eq!(n, text.len());
            assert_eq!(Ok(readings.temperature()), parsed);
        }
        Err(_) => {
            assert!(parsed.is_err());
            assert_eq!(readings.temperature(), 7);
        }
    }
    match control.set_humidity(text) {
        Ok(_) => assert_eq!(Ok(readings.humidity()), parsed),
        Err(_) => assert_eq!(readings.humidity(), 8),
    }
});
