//! Mock adapters for integration tests.
//!
//! A recording display, a scripted sensor, and helpers for bringing a rig
//! up on the simulated GPIO block and decoding what it put on the wires.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use envmon::app::ports::{DisplayPort, SensorPort, SensorSample};
use envmon::config::RigConfig;
use envmon::drivers::lcd::{DisplayLines, Mode};
use envmon::drivers::registers::{RegisterWrite, SimMapper, SimMemory};
use envmon::error::{Error, Result, SensorError};
use envmon::pins;

// ── Display call record ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Init,
    Show { line1: String, line2: String },
    Shutdown,
}

// ── RecordingDisplay ──────────────────────────────────────────

/// Records every call; clones share one log.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    calls: Arc<Mutex<Vec<DisplayCall>>>,
    fail_init: bool,
}

#[allow(dead_code)]
impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shows(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DisplayCall::Show { line1, line2 } => Some((line1, line2)),
                _ => None,
            })
            .collect()
    }

    /// A boxed clone sharing this log, for `Rig::attach`.
    pub fn boxed(&self) -> Box<dyn DisplayPort> {
        Box::new(self.clone())
    }
}

impl DisplayPort for RecordingDisplay {
    fn init(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(DisplayCall::Init);
        if self.fail_init {
            return Err(Error::Config("display absent"));
        }
        Ok(())
    }

    fn show(&mut self, lines: &DisplayLines) -> Result<()> {
        self.calls.lock().unwrap().push(DisplayCall::Show {
            line1: lines.line1.as_str().to_owned(),
            line2: lines.line2.as_str().to_owned(),
        });
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(DisplayCall::Shutdown);
        Ok(())
    }
}

// ── ScriptedSensor ────────────────────────────────────────────

/// Plays back samples; fails with `SensorError::Read` once exhausted.
pub struct ScriptedSensor(VecDeque<SensorSample>);

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(samples: &[(&str, &str)]) -> Self {
        Self(
            samples
                .iter()
                .map(|(t, h)| SensorSample {
                    temperature: (*t).to_owned(),
                    humidity: (*h).to_owned(),
                })
                .collect(),
        )
    }
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Result<SensorSample> {
        self.0.pop_front().ok_or(Error::Sensor(SensorError::Read))
    }
}

// ── Rig helpers ───────────────────────────────────────────────

/// Fast timings so tests finish quickly.
pub fn test_config() -> RigConfig {
    RigConfig {
        blink_period_ms: 10,
        alarm_pulse_us: 1,
        poll_interval_ms: 1,
        ..RigConfig::default()
    }
}

pub fn sim(config: &RigConfig) -> (Arc<SimMemory>, SimMapper) {
    let mem = SimMemory::new(config.gpio_base());
    let mapper = SimMapper::new(Arc::clone(&mem));
    (mem, mapper)
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

// ── Display bus decoding ──────────────────────────────────────

/// Replay set/clear writes and return every byte latched by the display
/// (on falling edges of E), high nibble first.
#[allow(dead_code)]
pub fn decode_lcd_bus(gpio_base: u32, history: &[RegisterWrite]) -> Vec<(Mode, u8)> {
    let bit = |pin: u8| 1u32 << pin;
    let mut levels = 0u32;
    let mut nibbles = Vec::new();

    for w in history {
        let before = levels;
        match w.phys - gpio_base {
            pins::GPSET0 => levels |= w.value,
            pins::GPCLR0 => levels &= !w.value,
            _ => continue,
        }
        let e_fell = before & bit(pins::LCD_E) != 0 && levels & bit(pins::LCD_E) == 0;
        if e_fell {
            let n = [pins::LCD_D4, pins::LCD_D5, pins::LCD_D6, pins::LCD_D7]
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &p)| acc | (u8::from(levels & bit(p) != 0) << i));
            let mode = if levels & bit(pins::LCD_RS) != 0 {
                Mode::Data
            } else {
                Mode::Instruction
            };
            nibbles.push((mode, n));
        }
    }

    nibbles
        .chunks_exact(2)
        .map(|pair| (pair[0].0, (pair[0].1 << 4) | pair[1].1))
        .collect()
}

/// Character data in `bytes`, as text.
#[allow(dead_code)]
pub fn data_text(bytes: &[(Mode, u8)]) -> String {
    bytes
        .iter()
        .filter(|(m, _)| *m == Mode::Data)
        .map(|(_, b)| char::from(*b))
        .collect()
}

/// Instruction bytes in `bytes`.
#[allow(dead_code)]
pub fn instructions(bytes: &[(Mode, u8)]) -> Vec<u8> {
    bytes
        .iter()
        .filter(|(m, _)| *m == Mode::Instruction)
        .map(|(_, b)| *b)
        .collect()
}
