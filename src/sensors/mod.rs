//! Sensor adapters implementing [`SensorPort`](crate::app::ports::SensorPort).

pub mod iio;
