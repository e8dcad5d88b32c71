//! envmon — Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  IioSensor ──▶ Poller ──▶ ControlSurface (set_temperature,   │
//! │                                          set_humidity)       │
//! │                               │                              │
//! │        ┌──────────────────────┼──────────────────────┐       │
//! │        ▼                      ▼                      ▼       │
//! │   blink timer            alarm queue           display queue │
//! │   (R/Y/G LEDs)           (buzzer)              (HD44780)     │
//! │        └──────────── GpioBank (mmap'd registers) ───┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use envmon::app::poller::Poller;
use envmon::app::service::Rig;
use envmon::config::RigConfig;
use envmon::drivers::registers::RegisterMapper;
use envmon::sensors::iio::IioSensor;

/// Drive the status light, alarm and display from a temperature/humidity sensor.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file (defaults apply to missing fields).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many polls and detach.
    #[arg(long, value_name = "N")]
    polls: Option<u64>,
}

#[cfg(all(feature = "rpi", target_os = "linux"))]
fn open_mapper(config: &RigConfig) -> Result<Box<dyn RegisterMapper>> {
    use envmon::drivers::registers::DevMemMapper;

    let mapper = DevMemMapper::open(&config.mem_device, config.gpio_base())
        .map_err(envmon::error::Error::from)
        .with_context(|| format!("opening {}", config.mem_device))?;
    Ok(Box::new(mapper))
}

#[cfg(not(all(feature = "rpi", target_os = "linux")))]
fn open_mapper(config: &RigConfig) -> Result<Box<dyn RegisterMapper>> {
    use envmon::drivers::registers::{SimMapper, SimMemory};

    log::warn!("built without the `rpi` feature: driving a simulated GPIO block");
    Ok(Box::new(SimMapper::new(SimMemory::new(config.gpio_base()))))
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("envmon v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = match &args.config {
        Some(path) => RigConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RigConfig::default(),
    };
    info!(
        "config: base=0x{:08X} blink={}ms pulse={}us poll={}ms verify={}",
        config.peripheral_base,
        config.blink_period_ms,
        config.alarm_pulse_us,
        config.poll_interval_ms,
        config.verify_writes
    );

    // ── 3. Attach ─────────────────────────────────────────────
    let mut mapper = open_mapper(&config)?;
    let rig = Rig::attach(mapper.as_mut(), &config, Rig::board_display).context("attaching rig")?;

    // ── 4. Poll until told to stop or the sensor fails ────────
    let sensor = IioSensor::new(&config.temperature_path, &config.humidity_path);
    let mut poller = Poller::new(sensor, rig.control());
    let polled = poller.run(Duration::from_millis(u64::from(config.poll_interval_ms)), args.polls);
    drop(poller);
    info!("rig: final state {:?}", rig.snapshot());

    // ── 5. Detach ─────────────────────────────────────────────
    rig.detach(mapper.as_mut()).context("detaching rig")?;

    let polls = polled.context("sensor polling stopped")?;
    info!("done after {} poll(s)", polls);
    Ok(())
}
