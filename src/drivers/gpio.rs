//! GPIO pin configurator for the BCM283x GPIO block.
//!
//! Every pin the rig drives gets a [`PinDescriptor`]: the function-select
//! word and 3-bit field it owns, and its bit in the set/clear/level words.
//! All of it is computed once, in `const` context, from the pin number.
//!
//! ## Configuration vs. runtime access
//!
//! Function-select words are shared by ten pins each, so programming one
//! pin is a read-modify-write of a word other pins live in.  [`GpioBank`]
//! only allows that through `&mut self`.  At runtime the bank is shared as
//! `Arc<GpioBank>`, which hands out `&self` only — set/clear writes, which
//! are single-word and race-free — so every function-select update has
//! necessarily happened before any actuator starts toggling.

use core::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, info};

use crate::drivers::registers::{RegisterHandle, RegisterMapper, log_mapped};
use crate::error::{Error, HardwareFault, Result};
use crate::pins;

/// Pin function codes (3-bit field values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Function {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

/// Derived register constants for one GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinDescriptor {
    pin: u8,
    fsel_word: usize,
    fsel_shift: u32,
}

impl PinDescriptor {
    /// Describe a bank-0 pin (0–31).
    pub const fn new(pin: u8) -> Self {
        assert!(pin <= pins::MAX_BANK0_PIN, "only bank-0 pins are addressable");
        Self {
            pin,
            fsel_word: (pin / 10) as usize,
            fsel_shift: (pin % 10) as u32 * 3,
        }
    }

    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// Index of the function-select word (GPFSELn) holding this pin.
    pub const fn fsel_word(&self) -> usize {
        self.fsel_word
    }

    /// Byte offset of that word from the GPIO base.
    pub const fn fsel_offset(&self) -> u32 {
        pins::GPFSEL0 + 4 * self.fsel_word as u32
    }

    /// Bit position of the pin's 3-bit function field.
    pub const fn fsel_shift(&self) -> u32 {
        self.fsel_shift
    }

    /// Mask covering the pin's function field.
    pub const fn fsel_mask(&self) -> u32 {
        0b111 << self.fsel_shift
    }

    /// Field value selecting `function` for this pin.
    pub const fn fsel_bits(&self, function: Function) -> u32 {
        (function as u32) << self.fsel_shift
    }

    /// The pin's bit in GPSET0 / GPCLR0 / GPLEV0.
    pub const fn mask(&self) -> PinMask {
        PinMask(1 << (self.pin % 32))
    }
}

/// A set of bank-0 pins, written together in one set or clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinMask(u32);

impl PinMask {
    pub const EMPTY: Self = Self(0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PinMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PinMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Mapped GPIO registers for the pins one rig uses.
pub struct GpioBank {
    fsel: [Option<RegisterHandle>; pins::GPFSEL_COUNT],
    set: RegisterHandle,
    clr: RegisterHandle,
    lev: RegisterHandle,
    verify_writes: bool,
}

impl GpioBank {
    /// Map the function-select words `pins` live in, plus GPSET0, GPCLR0
    /// and GPLEV0.  On failure every mapping made so far is released.
    pub fn map(
        mapper: &mut dyn RegisterMapper,
        gpio_base: u32,
        pins: &[PinDescriptor],
        verify_writes: bool,
    ) -> Result<Self> {
        let mut fsel: [Option<RegisterHandle>; pins::GPFSEL_COUNT] = [const { None }; pins::GPFSEL_COUNT];

        let mapped = (|| {
            for pin in pins {
                if fsel[pin.fsel_word()].is_none() {
                    fsel[pin.fsel_word()] = Some(mapper.map(gpio_base + pin.fsel_offset())?);
                }
            }
            let set = mapper.map(gpio_base + pins::GPSET0)?;
            let clr = match mapper.map(gpio_base + pins::GPCLR0) {
                Ok(h) => h,
                Err(e) => {
                    mapper.unmap(set);
                    return Err(e);
                }
            };
            let lev = match mapper.map(gpio_base + pins::GPLEV0) {
                Ok(h) => h,
                Err(e) => {
                    mapper.unmap(set);
                    mapper.unmap(clr);
                    return Err(e);
                }
            };
            Ok((set, clr, lev))
        })();

        match mapped {
            Ok((set, clr, lev)) => {
                let bank = Self {
                    fsel,
                    set,
                    clr,
                    lev,
                    verify_writes,
                };
                log_mapped("gpio", &bank.handles());
                Ok(bank)
            }
            Err(e) => {
                for handle in fsel.into_iter().flatten() {
                    mapper.unmap(handle);
                }
                Err(e.into())
            }
        }
    }

    fn handles(&self) -> Vec<&RegisterHandle> {
        self.fsel
            .iter()
            .flatten()
            .chain([&self.set, &self.clr, &self.lev])
            .collect()
    }

    /// Program `pin`'s function field, leaving every other field of the
    /// shared word untouched.
    pub fn set_function(&mut self, pin: PinDescriptor, function: Function) -> Result<()> {
        let word = self.fsel[pin.fsel_word()]
            .as_ref()
            .ok_or(Error::Config("function-select word not mapped for pin"))?;
        let current = word.read_word();
        let updated = (current & !pin.fsel_mask()) | (pin.fsel_bits(function) & pin.fsel_mask());
        word.write_word(updated);
        debug!(
            "gpio: GPIO{} -> {:?} (GPFSEL{} 0x{:08X} -> 0x{:08X})",
            pin.pin(),
            function,
            pin.fsel_word(),
            current,
            updated
        );
        Ok(())
    }

    /// Make `pin` a digital output.
    pub fn configure_as_output(&mut self, pin: PinDescriptor) -> Result<()> {
        self.set_function(pin, Function::Output)
    }

    /// Drive every pin in `mask` high with a single GPSET0 write.
    pub fn set(&self, mask: PinMask) -> Result<()> {
        self.set.write_word(mask.bits());
        if self.verify_writes {
            self.verify(mask, true)?;
        }
        Ok(())
    }

    /// Drive every pin in `mask` low with a single GPCLR0 write.
    pub fn clear(&self, mask: PinMask) -> Result<()> {
        self.clr.write_word(mask.bits());
        if self.verify_writes {
            self.verify(mask, false)?;
        }
        Ok(())
    }

    /// Current level of `pin`.
    pub fn level(&self, pin: PinDescriptor) -> bool {
        self.lev.read_word() & pin.mask().bits() != 0
    }

    fn verify(&self, mask: PinMask, high: bool) -> Result<()> {
        let levels = self.lev.read_word();
        let wrong = if high {
            mask.bits() & !levels
        } else {
            mask.bits() & levels
        };
        if wrong == 0 {
            return Ok(());
        }
        Err(HardwareFault {
            pin: wrong.trailing_zeros() as u8,
            expected_high: high,
        }
        .into())
    }

    /// Release every mapping.  Consuming `self` guarantees nothing can
    /// touch the registers afterwards.
    pub fn unmap(self, mapper: &mut dyn RegisterMapper) {
        let count = self.handles().len();
        for handle in self.fsel.into_iter().flatten() {
            mapper.unmap(handle);
        }
        mapper.unmap(self.set);
        mapper.unmap(self.clr);
        mapper.unmap(self.lev);
        info!("gpio: {} registers unmapped", count);
    }
}

/// One GPIO output as an embedded-hal pin, for bus drivers that toggle
/// lines individually.
#[derive(Clone)]
pub struct RegisterPin {
    bank: Arc<GpioBank>,
    pin: PinDescriptor,
}

impl RegisterPin {
    pub fn new(bank: Arc<GpioBank>, pin: PinDescriptor) -> Self {
        Self { bank, pin }
    }
}

impl ErrorType for RegisterPin {
    type Error = Error;
}

impl OutputPin for RegisterPin {
    fn set_low(&mut self) -> Result<()> {
        self.bank.clear(self.pin.mask())
    }

    fn set_high(&mut self) -> Result<()> {
        self.bank.set(self.pin.mask())
    }
}
