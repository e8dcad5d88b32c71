//! Temperature/humidity from a Linux Industrial I/O device.
//!
//! The IIO core exposes each channel as a sysfs text file holding one
//! integer and a newline.  Every read of the file triggers a fresh
//! conversion, so the files are reopened on each sample rather than held.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::{SensorPort, SensorSample};
use crate::error::{Result, SensorError};

pub struct IioSensor {
    temperature_path: PathBuf,
    humidity_path: PathBuf,
}

impl IioSensor {
    pub fn new(temperature_path: impl Into<PathBuf>, humidity_path: impl Into<PathBuf>) -> Self {
        Self {
            temperature_path: temperature_path.into(),
            humidity_path: humidity_path.into(),
        }
    }

    fn read_channel(path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e: io::Error| {
            warn!("iio: {}: {}", path.display(), e);
            SensorError::Read
        })?;
        let mut text = String::from_utf8(bytes).map_err(|_| {
            warn!("iio: {}: not text", path.display());
            SensorError::Malformed
        })?;
        if text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }
}

impl SensorPort for IioSensor {
    fn read(&mut self) -> Result<SensorSample> {
        let temperature = Self::read_channel(&self.temperature_path)?;
        let humidity = Self::read_channel(&self.humidity_path)?;
        debug!("iio: T={:?} H={:?}", temperature, humidity);
        Ok(SensorSample {
            temperature,
            humidity,
        })
    }
}
