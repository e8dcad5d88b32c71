//! HD44780-compatible 16x2 character display on a 4-bit parallel bus.
//!
//! Seven GPIO lines: four data lines (D4–D7), register select, read/write
//! and enable.  Every byte goes out as two nibble transfers, high nibble
//! first; the controller latches the data lines on the falling edge of
//! enable.
//!
//! ```text
//!  RS/RW  ──<   mode   >─────────────────────────────
//!  E      ______|‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾|________________
//!  D4..D7 ──────────<   nibble    >──────────────────
//!             1µs             2µs          1ms
//! ```
//!
//! RW is held low throughout: the display is written, never read, so busy
//! polling is replaced by fixed settle delays.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::String;
use log::debug;

use crate::app::ports::DisplayPort;
use crate::drivers::gpio::PinDescriptor;
use crate::error::{Error, Result};
use crate::pins;

/// Instruction bytes.
pub mod cmd {
    pub const CLEAR_DISPLAY: u8 = 0x01;
    pub const ENTRY_MODE_INCREMENT: u8 = 0x06;
    pub const DISPLAY_ON_CURSOR_OFF: u8 = 0x0C;
    pub const FUNCTION_SET_4BIT_2LINE: u8 = 0x28;
    /// Set DDRAM address: start of the first line.
    pub const LINE1: u8 = 0x80;
    /// Set DDRAM address: start of the second line.
    pub const LINE2: u8 = 0xC0;
}

/// Mode lines raised, before enable goes high.
const SETUP_US: u32 = 1;
/// Enable high time with data presented.
const HOLD_US: u32 = 2;
/// Per-nibble settle time.
const SETTLE_MS: u32 = 1;
/// Power-on wait before the first instruction, and before a redraw.
const POWER_ON_MS: u32 = 50;
/// Clear-display execution time.
const CLEAR_MS: u32 = 2;

/// Characters per line held in DDRAM.
pub const LINE_CAPACITY: usize = 40;

/// Register select: instruction or character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Instruction,
    Data,
}

/// The seven bus lines.
pub struct LcdPins<P> {
    pub d4: P,
    pub d5: P,
    pub d6: P,
    pub d7: P,
    pub rs: P,
    pub rw: P,
    pub e: P,
}

impl LcdPins<PinDescriptor> {
    /// The board wiring.
    pub const fn board() -> Self {
        Self {
            d4: PinDescriptor::new(pins::LCD_D4),
            d5: PinDescriptor::new(pins::LCD_D5),
            d6: PinDescriptor::new(pins::LCD_D6),
            d7: PinDescriptor::new(pins::LCD_D7),
            rs: PinDescriptor::new(pins::LCD_RS),
            rw: PinDescriptor::new(pins::LCD_RW),
            e: PinDescriptor::new(pins::LCD_E),
        }
    }
}

impl<P> LcdPins<P> {
    pub fn map<Q>(self, mut f: impl FnMut(P) -> Q) -> LcdPins<Q> {
        LcdPins {
            d4: f(self.d4),
            d5: f(self.d5),
            d6: f(self.d6),
            d7: f(self.d7),
            rs: f(self.rs),
            rw: f(self.rw),
            e: f(self.e),
        }
    }

    pub fn into_array(self) -> [P; 7] {
        [self.d4, self.d5, self.d6, self.d7, self.rs, self.rw, self.e]
    }
}

/// Text for both display lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLines {
    pub line1: String<LINE_CAPACITY>,
    pub line2: String<LINE_CAPACITY>,
}

impl DisplayLines {
    /// `Temperature: {t}` over `Humidity: {h}`.
    pub fn readings(temperature: i32, humidity: i32) -> Self {
        let mut line1 = String::new();
        let mut line2 = String::new();
        // Longest i32 is 11 chars, so both lines fit.
        let _ = write!(line1, "Temperature: {temperature}");
        let _ = write!(line2, "Humidity: {humidity}");
        Self { line1, line2 }
    }

    /// Shown between initialisation and the first humidity write.
    pub fn placeholder() -> Self {
        let mut line1 = String::new();
        let mut line2 = String::new();
        // Both literals are shorter than a line.
        let _ = line1.push_str("Temperature: xx");
        let _ = line2.push_str("Humidity: xx");
        Self { line1, line2 }
    }
}

pub struct Lcd1602<P, D> {
    pins: LcdPins<P>,
    delay: D,
}

impl<P, D> Lcd1602<P, D>
where
    P: OutputPin,
    Error: From<P::Error>,
    D: DelayNs,
{
    pub fn new(pins: LcdPins<P>, delay: D) -> Self {
        Self { pins, delay }
    }

    fn drive(pin: &mut P, high: bool) -> Result<()> {
        if high {
            pin.set_high()?;
        } else {
            pin.set_low()?;
        }
        Ok(())
    }

    fn mode_lines(&mut self, mode: Mode, enable: bool) -> Result<()> {
        Self::drive(&mut self.pins.rs, mode == Mode::Data)?;
        Self::drive(&mut self.pins.rw, false)?;
        Self::drive(&mut self.pins.e, enable)
    }

    fn data_lines(&mut self, nibble: u8) -> Result<()> {
        Self::drive(&mut self.pins.d4, nibble & 0x1 != 0)?;
        Self::drive(&mut self.pins.d5, nibble & 0x2 != 0)?;
        Self::drive(&mut self.pins.d6, nibble & 0x4 != 0)?;
        Self::drive(&mut self.pins.d7, nibble & 0x8 != 0)
    }

    /// Clock the low four bits of `nibble` into the controller.
    pub fn write_nibble(&mut self, mode: Mode, nibble: u8) -> Result<()> {
        self.mode_lines(mode, false)?;
        self.delay.delay_us(SETUP_US);
        Self::drive(&mut self.pins.e, true)?;
        self.data_lines(nibble)?;
        self.delay.delay_us(HOLD_US);
        Self::drive(&mut self.pins.e, false)?;
        self.delay.delay_ms(SETTLE_MS);
        Ok(())
    }

    /// A full byte: high nibble, then low nibble.
    pub fn write_byte(&mut self, mode: Mode, value: u8) -> Result<()> {
        self.write_nibble(mode, value >> 4)?;
        self.write_nibble(mode, value & 0x0F)
    }

    pub fn instruction(&mut self, value: u8) -> Result<()> {
        self.write_byte(Mode::Instruction, value)
    }

    pub fn write_char(&mut self, c: u8) -> Result<()> {
        self.write_byte(Mode::Data, c)
    }

    /// Write every byte of `text` at the current cursor.
    pub fn puts(&mut self, text: &str) -> Result<()> {
        text.bytes().try_for_each(|b| self.write_char(b))
    }

    fn clear_screen(&mut self) -> Result<()> {
        self.instruction(cmd::CLEAR_DISPLAY)?;
        self.delay.delay_ms(CLEAR_MS);
        Ok(())
    }

    fn write_lines(&mut self, lines: &DisplayLines) -> Result<()> {
        self.instruction(cmd::LINE1)?;
        self.puts(&lines.line1)?;
        self.instruction(cmd::LINE2)?;
        self.puts(&lines.line2)
    }

    /// Power-on sequence: 4-bit two-line mode, display on, cursor
    /// auto-increment, clear, then the placeholder text.
    pub fn init(&mut self) -> Result<()> {
        self.delay.delay_ms(POWER_ON_MS);
        self.instruction(cmd::FUNCTION_SET_4BIT_2LINE)?;
        self.instruction(cmd::DISPLAY_ON_CURSOR_OFF)?;
        self.instruction(cmd::ENTRY_MODE_INCREMENT)?;
        self.clear_screen()?;
        self.write_lines(&DisplayLines::placeholder())?;
        debug!("lcd: initialised");
        Ok(())
    }

    /// Replace the screen contents with `lines`.
    pub fn redraw(&mut self, lines: &DisplayLines) -> Result<()> {
        self.delay.delay_ms(POWER_ON_MS);
        self.clear_screen()?;
        self.write_lines(lines)
    }

    /// Blank the screen.
    pub fn clear(&mut self) -> Result<()> {
        self.delay.delay_ms(POWER_ON_MS);
        self.instruction(cmd::CLEAR_DISPLAY)
    }
}

impl<P, D> DisplayPort for Lcd1602<P, D>
where
    P: OutputPin + Send,
    Error: From<P::Error>,
    D: DelayNs + Send,
{
    fn init(&mut self) -> Result<()> {
        Lcd1602::init(self)
    }

    fn show(&mut self, lines: &DisplayLines) -> Result<()> {
        self.redraw(lines)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.clear()
    }
}
