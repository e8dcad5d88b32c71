//! Register access, GPIO configuration, and the actuator drivers.

pub mod buzzer;
pub mod delay;
pub mod gpio;
pub mod lcd;
pub mod registers;
pub mod status_led;
pub mod task;
pub mod timer;
