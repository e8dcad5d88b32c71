//! Unified error types for the monitoring rig.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! daemon's error handling uniform.  All variants are `Copy` so they can be
//! passed out of worker threads and timer callbacks without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the rig funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register region could not be made addressable.  Fatal at attach.
    Map(MapError),
    /// A control-surface write was malformed.  Only that write is rejected.
    InvalidInput(InputError),
    /// A GPIO write did not take effect (only detectable with `verify_writes`).
    HardwareFault(HardwareFault),
    /// The sensor collaborator could not be read.
    Sensor(SensorError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A worker thread could not be started (carries the worker name).
    Spawn(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(e) => write!(f, "map: {e}"),
            Self::InvalidInput(e) => write!(f, "invalid input: {e}"),
            Self::HardwareFault(e) => write!(f, "hardware fault: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(name) => write!(f, "could not start worker '{name}'"),
        }
    }
}

impl std::error::Error for Error {}

impl From<core::convert::Infallible> for Error {
    fn from(e: core::convert::Infallible) -> Self {
        match e {}
    }
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

// ---------------------------------------------------------------------------
// Register mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorKind {
    /// The memory device could not be opened.
    DeviceOpen,
    /// `mmap` refused the range.
    Mmap,
    /// Register addresses must be 32-bit aligned.
    Unaligned,
    /// The address already has a live mapping.
    AlreadyMapped,
    /// The mapping is still referenced and cannot be released.
    InUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapError {
    /// Physical address that failed to map.
    pub phys: u32,
    pub kind: MapErrorKind,
}

impl MapError {
    pub const fn new(phys: u32, kind: MapErrorKind) -> Self {
        Self { phys, kind }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            MapErrorKind::DeviceOpen => "memory device open failed",
            MapErrorKind::Mmap => "mmap failed",
            MapErrorKind::Unaligned => "address not word aligned",
            MapErrorKind::AlreadyMapped => "address already mapped",
            MapErrorKind::InUse => "mapping still in use",
        };
        write!(f, "{what} (phys=0x{:08X})", self.phys)
    }
}

impl From<MapError> for Error {
    fn from(e: MapError) -> Self {
        Self::Map(e)
    }
}

// ---------------------------------------------------------------------------
// Control-surface input errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Nothing was written besides a newline.
    Empty,
    /// The text is not a base-10 integer.
    NotANumber,
    /// The integer does not fit a reading.
    OutOfRange,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty value"),
            Self::NotANumber => write!(f, "not a base-10 integer"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Self::InvalidInput(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

/// A set/clear write whose readback did not match.
///
/// There is no retry path: a stuck output is fatal for the actuator that
/// observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareFault {
    pub pin: u8,
    pub expected_high: bool,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.expected_high { "high" } else { "low" };
        write!(f, "GPIO{} did not go {level}", self.pin)
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Self {
        Self::HardwareFault(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor file could not be read.
    Read,
    /// The sensor produced something other than ASCII text.
    Malformed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read failed"),
            Self::Malformed => write!(f, "malformed sample"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
