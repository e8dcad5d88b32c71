//! Rig lifecycle and actuator behaviour on the simulated GPIO block.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use envmon::app::ports::ReadingSink;
use envmon::app::service::Rig;
use envmon::config::RigConfig;
use envmon::drivers::gpio::{GpioBank, PinDescriptor};
use envmon::drivers::status_led::BlinkBand;
use envmon::error::{Error, HardwareFault, InputError, MapErrorKind};
use envmon::pins;

use crate::mock_hw::{DisplayCall, RecordingDisplay, sim, test_config, wait_until};

const ALL_PINS: [u8; 11] = [
    pins::LED_RED,
    pins::LED_YELLOW,
    pins::LED_GREEN,
    pins::BUZZER,
    pins::LCD_D4,
    pins::LCD_D5,
    pins::LCD_D6,
    pins::LCD_D7,
    pins::LCD_RS,
    pins::LCD_RW,
    pins::LCD_E,
];

fn all_mask() -> u32 {
    ALL_PINS.iter().fold(0, |m, p| m | (1u32 << p))
}

// ── Attach ────────────────────────────────────────────────────

#[test]
fn attach_makes_every_pin_an_output_and_keeps_foreign_fields() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    // GPIO10 and GPIO19 are not ours; their fields must survive.
    let foreign = 0b100 | (0b010 << 27);
    mem.preload(0x04, foreign);

    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    for pin in ALL_PINS {
        let d = PinDescriptor::new(pin);
        let field = (mem.word(d.fsel_offset()) >> d.fsel_shift()) & 0b111;
        assert_eq!(field, 0b001, "GPIO{pin} not an output");
    }
    assert_eq!(mem.word(0x04) & 0b111, 0b100);
    assert_eq!((mem.word(0x04) >> 27) & 0b111, 0b010);

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn attach_drives_outputs_low_and_initialises_the_display() {
    let cfg = RigConfig {
        blink_period_ms: 60_000,
        ..test_config()
    };
    let (mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();

    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    assert_eq!(mem.writes_to(pins::GPCLR0), vec![all_mask()]);
    assert!(mem.writes_to(pins::GPSET0).is_empty());
    assert_eq!(display.calls(), vec![DisplayCall::Init]);

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn map_failure_releases_everything() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    mem.refuse_map(pins::GPLEV0);

    let mut built = false;
    let err = Rig::attach(&mut mapper, &cfg, |_| {
        built = true;
        RecordingDisplay::new().boxed()
    })
    .err()
    .unwrap();

    assert!(matches!(err, Error::Map(e) if e.kind == MapErrorKind::Mmap));
    assert!(!built);
    assert_eq!(mem.mapped_count(), 0);
}

#[test]
fn display_init_failure_releases_everything() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::failing_init();

    assert!(Rig::attach(&mut mapper, &cfg, |_| display.boxed()).is_err());
    assert_eq!(mem.mapped_count(), 0);
}

#[test]
fn stuck_output_fails_attach_when_verifying() {
    let cfg = RigConfig {
        verify_writes: true,
        ..test_config()
    };
    let (mem, mut mapper) = sim(&cfg);
    mem.stick(pins::LED_GREEN, true);

    let err = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed())
        .err()
        .unwrap();
    assert_eq!(
        err,
        Error::HardwareFault(HardwareFault {
            pin: pins::LED_GREEN,
            expected_high: false
        })
    );
    assert_eq!(mem.mapped_count(), 0);
}

// ── Blink engine ──────────────────────────────────────────────

#[test]
fn blinks_the_led_for_the_current_band() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed()).unwrap();

    rig.control().set_temperature("28\n").unwrap();
    assert_eq!(rig.snapshot().band, BlinkBand::Yellow);
    let yellow = 1u32 << pins::LED_YELLOW;
    let leds = (1u32 << pins::LED_RED) | yellow | (1u32 << pins::LED_GREEN);

    assert!(wait_until(|| {
        let sets = mem.writes_to(pins::GPSET0);
        let clears = mem.writes_to(pins::GPCLR0);
        sets.contains(&yellow) && clears.iter().filter(|&&m| m == leds).count() >= 1
    }));
    // Only whole-band masks are ever raised by the blink engine.
    for mask in mem.writes_to(pins::GPSET0) {
        assert!(mask == yellow || mask == leds, "unexpected set 0x{mask:08X}");
    }

    rig.detach(&mut mapper).unwrap();
}

// ── Alarm ─────────────────────────────────────────────────────

#[test]
fn alarm_sounds_above_thirty_and_stops_when_cooled() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed()).unwrap();
    let control = rig.control();

    control.set_temperature("30").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.snapshot().alarm_pulses, 0);

    control.set_temperature("31").unwrap();
    assert!(wait_until(|| rig.snapshot().alarm_pulses >= 5));

    control.set_temperature("20").unwrap();
    assert!(wait_until(|| {
        let before = rig.snapshot().alarm_pulses;
        std::thread::sleep(Duration::from_millis(20));
        rig.snapshot().alarm_pulses == before && !rig.snapshot().alarm_pending
    }));
    assert!(!mem.level(pins::BUZZER));

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn repeated_hot_writes_run_one_oscillator() {
    let cfg = RigConfig {
        alarm_pulse_us: 2_000,
        ..test_config()
    };
    let (_mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed()).unwrap();

    for _ in 0..50 {
        rig.control().set_temperature("45").unwrap();
    }
    // At 4ms per period, 100ms is ~25 periods; a second oscillator would
    // roughly double that.
    std::thread::sleep(Duration::from_millis(100));
    let pulses = rig.snapshot().alarm_pulses;
    assert!(pulses <= 30, "{pulses} pulses in 100ms");

    rig.detach(&mut mapper).unwrap();
}

// ── Display ───────────────────────────────────────────────────

#[test]
fn humidity_write_redraws_with_both_readings() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    rig.control().set_temperature("27").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(display.shows().is_empty(), "temperature alone must not redraw");

    rig.control().set_humidity("64\n").unwrap();
    assert!(wait_until(|| !display.shows().is_empty()));
    assert_eq!(
        display.shows().last().unwrap(),
        &("Temperature: 27".to_owned(), "Humidity: 64".to_owned())
    );

    rig.detach(&mut mapper).unwrap();
}

// ── Rejected input ────────────────────────────────────────────

#[test]
fn rejected_write_changes_nothing() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();
    let control = rig.control();

    control.set_temperature("22").unwrap();
    control.set_humidity("50").unwrap();
    assert!(wait_until(|| display.shows().len() == 1));

    assert_eq!(
        control.set_temperature("hot"),
        Err(Error::InvalidInput(InputError::NotANumber))
    );
    assert_eq!(control.set_humidity(""), Err(Error::InvalidInput(InputError::Empty)));
    std::thread::sleep(Duration::from_millis(20));

    let snap = rig.snapshot();
    assert_eq!((snap.readings.temperature, snap.readings.humidity), (22, 50));
    assert_eq!(display.shows().len(), 1);
    assert_eq!(snap.alarm_pulses, 0);

    rig.detach(&mut mapper).unwrap();
}

// ── Detach ────────────────────────────────────────────────────

#[test]
fn detach_silences_everything_and_unmaps() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    rig.control().set_temperature("50").unwrap();
    assert!(wait_until(|| rig.snapshot().alarm_pulses >= 3));
    rig.detach(&mut mapper).unwrap();

    assert_eq!(mem.mapped_count(), 0);
    for pin in [pins::LED_RED, pins::LED_YELLOW, pins::LED_GREEN, pins::BUZZER] {
        assert!(!mem.level(pin), "GPIO{pin} left high");
    }
    assert_eq!(display.calls().last(), Some(&DisplayCall::Shutdown));

    // Nothing touches the registers after detach.
    let writes = mem.write_count();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(mem.write_count(), writes);
}

#[test]
fn detach_refuses_to_unmap_a_bank_still_in_use() {
    let cfg = test_config();
    let (mem, mut mapper) = sim(&cfg);
    let leaked: Arc<Mutex<Option<Arc<GpioBank>>>> = Arc::default();

    let rig = Rig::attach(&mut mapper, &cfg, |bank| {
        *leaked.lock().unwrap() = Some(Arc::clone(bank));
        RecordingDisplay::new().boxed()
    })
    .unwrap();

    let err = rig.detach(&mut mapper).unwrap_err();
    assert!(matches!(err, Error::Map(e) if e.kind == MapErrorKind::InUse));
    assert!(mem.mapped_count() > 0);
}
