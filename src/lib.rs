//! Environmental-monitoring rig library.
//!
//! Register-level GPIO drivers for a tri-colour status light, a buzzer
//! alarm and an HD44780 character display, plus the glue that feeds them
//! temperature/humidity readings.  Hardware access goes through
//! [`drivers::registers::RegisterMapper`]; the `rpi` feature adds the
//! `/dev/gpiomem` backend, and every build carries the in-memory one used
//! by tests and dry runs.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod scheduler;
pub mod sensors;
