//! GPIO pin assignments and BCM283x GPIO register layout for the rig board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers or register offsets.

// ---------------------------------------------------------------------------
// GPIO controller register layout (offsets from the GPIO block base)
// ---------------------------------------------------------------------------

/// Offset of the GPIO block from the peripheral base.
pub const GPIO_BLOCK_OFFSET: u32 = 0x20_0000;

/// Function-select registers: 6 words, 10 pins per word, 3 bits per pin.
pub const GPFSEL0: u32 = 0x00;
pub const GPFSEL_COUNT: usize = 6;
/// Output set register for pins 0–31.
pub const GPSET0: u32 = 0x1C;
/// Output clear register for pins 0–31.
pub const GPCLR0: u32 = 0x28;
/// Pin level register for pins 0–31 (read-only).
pub const GPLEV0: u32 = 0x34;

/// Highest pin reachable through the bank-0 set/clear/level words.
pub const MAX_BANK0_PIN: u8 = 31;

// ---------------------------------------------------------------------------
// Tri-colour status light
// ---------------------------------------------------------------------------

/// Red LED — blinks above 30 °C.  FSEL17 lives in GPFSEL1 (bits 21..23).
pub const LED_RED: u8 = 17;
/// Yellow LED — blinks from 26 to 30 °C.  FSEL27 lives in GPFSEL2.
pub const LED_YELLOW: u8 = 27;
/// Green LED — blinks up to 25 °C.  FSEL22 lives in GPFSEL2.
pub const LED_GREEN: u8 = 22;

// ---------------------------------------------------------------------------
// Alarm
// ---------------------------------------------------------------------------

/// Piezo buzzer.  Shares GPFSEL1 with the red LED.
pub const BUZZER: u8 = 18;

// ---------------------------------------------------------------------------
// HD44780 character display, 4-bit bus
// ---------------------------------------------------------------------------

pub const LCD_D4: u8 = 23;
pub const LCD_D5: u8 = 24;
pub const LCD_D6: u8 = 25;
pub const LCD_D7: u8 = 12;
pub const LCD_RS: u8 = 7;
pub const LCD_RW: u8 = 16;
pub const LCD_E: u8 = 8;
