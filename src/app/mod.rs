//! Rig core: shared readings, control surface, lifecycle and polling.
//!
//! Hardware is reached only through the drivers and the port traits in
//! [`ports`], so everything here runs against the simulated GPIO block.

pub mod control;
pub mod poller;
pub mod ports;
pub mod readings;
pub mod service;
