//! The board display end to end: LCD driver on register-backed pins,
//! decoded back from the simulated set/clear register writes.

use envmon::app::ports::ReadingSink;
use envmon::app::service::Rig;
use envmon::config::RigConfig;
use envmon::drivers::lcd::{Mode, cmd};

use crate::mock_hw::{data_text, decode_lcd_bus, instructions, sim, test_config, wait_until};

fn quiet_config() -> RigConfig {
    // Keep the blink timer out of the way; it does not touch bus pins anyway.
    RigConfig {
        blink_period_ms: 60_000,
        ..test_config()
    }
}

#[test]
fn attach_puts_the_init_sequence_on_the_bus() {
    let cfg = quiet_config();
    let (mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, Rig::board_display).unwrap();

    let bytes = decode_lcd_bus(cfg.gpio_base(), &mem.history());
    assert_eq!(instructions(&bytes), vec![0x28, 0x0C, 0x06, 0x01, 0x80, 0xC0]);
    assert_eq!(data_text(&bytes), "Temperature: xxHumidity: xx");

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn humidity_write_redraws_the_screen() {
    let cfg = quiet_config();
    let (mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, Rig::board_display).unwrap();
    mem.clear_history();

    rig.control().set_temperature("19").unwrap();
    rig.control().set_humidity("58").unwrap();

    let expected = "Temperature: 19Humidity: 58";
    assert!(wait_until(|| data_text(&decode_lcd_bus(cfg.gpio_base(), &mem.history())) == expected));

    let bytes = decode_lcd_bus(cfg.gpio_base(), &mem.history());
    assert_eq!(bytes[0], (Mode::Instruction, cmd::CLEAR_DISPLAY));
    assert_eq!(bytes[1], (Mode::Instruction, cmd::LINE1));
    assert_eq!(instructions(&bytes), vec![cmd::CLEAR_DISPLAY, cmd::LINE1, cmd::LINE2]);

    rig.detach(&mut mapper).unwrap();
}

#[test]
fn detach_blanks_the_display() {
    let cfg = quiet_config();
    let (mem, mut mapper) = sim(&cfg);
    let rig = Rig::attach(&mut mapper, &cfg, Rig::board_display).unwrap();
    mem.clear_history();

    rig.detach(&mut mapper).unwrap();

    let bytes = decode_lcd_bus(cfg.gpio_base(), &mem.history());
    assert_eq!(bytes, vec![(Mode::Instruction, cmd::CLEAR_DISPLAY)]);
    assert_eq!(mem.mapped_count(), 0);
}
