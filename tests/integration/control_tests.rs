//! Control surface and poller against a live rig.

use envmon::app::poller::{PollOutcome, Poller};
use envmon::app::ports::ReadingSink;
use envmon::app::service::Rig;
use envmon::error::{Error, InputError, SensorError};

use crate::mock_hw::{RecordingDisplay, ScriptedSensor, sim, test_config, wait_until};

#[test]
fn accepted_write_reports_its_full_length() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed()).unwrap();

    assert_eq!(rig.control().set_temperature("23\n"), Ok(3));
    assert_eq!(rig.control().set_humidity("-1"), Ok(2));
    assert_eq!(rig.control().temperature(), 23);
    assert_eq!(rig.control().humidity(), -1);

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn out_of_range_reading_is_rejected() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, |_| RecordingDisplay::new().boxed()).unwrap();

    assert_eq!(
        rig.control().set_temperature("9999999999"),
        Err(Error::InvalidInput(InputError::OutOfRange))
    );
    assert_eq!(rig.control().temperature(), 0);

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn poller_feeds_every_actuator() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    let sensor = ScriptedSensor::new(&[("24", "40"), ("33", "45")]);
    let mut poller = Poller::new(sensor, rig.control());

    assert_eq!(
        poller.poll_once(),
        Ok(PollOutcome {
            temperature_accepted: true,
            humidity_accepted: true
        })
    );
    assert!(wait_until(|| display.shows().len() == 1));

    poller.poll_once().unwrap();
    assert!(wait_until(|| rig.snapshot().alarm_pulses > 0));
    assert!(wait_until(|| {
        display.shows().last() == Some(&("Temperature: 33".to_owned(), "Humidity: 45".to_owned()))
    }));

    // Script exhausted: the sensor failure ends the run.
    assert_eq!(
        poller.run(std::time::Duration::ZERO, None),
        Err(Error::Sensor(SensorError::Read))
    );
    drop(poller);

    rig.control().set_temperature("20").unwrap();
    rig.detach(&mut mapper).unwrap();
}

#[test]
fn poller_skips_a_bad_reading_and_keeps_going() {
    let cfg = test_config();
    let (_mem, mut mapper) = sim(&cfg);
    let display = RecordingDisplay::new();
    let rig = Rig::attach(&mut mapper, &cfg, |_| display.boxed()).unwrap();

    let sensor = ScriptedSensor::new(&[("garbage", "40"), ("21", "41")]);
    let mut poller = Poller::new(sensor, rig.control());

    assert_eq!(poller.run(std::time::Duration::ZERO, Some(2)), Ok(2));
    assert_eq!(rig.control().temperature(), 21);
    assert!(wait_until(|| {
        display.shows().last() == Some(&("Temperature: 21".to_owned(), "Humidity: 41".to_owned()))
    }));
    drop(poller);

    rig.detach(&mut mapper).unwrap();
}
