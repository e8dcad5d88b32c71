//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters and the simulated GPIO block.  All tests run on
//! the host with no real hardware required.

mod control_tests;
mod lcd_bus_tests;
mod mock_hw;
mod rig_tests;
