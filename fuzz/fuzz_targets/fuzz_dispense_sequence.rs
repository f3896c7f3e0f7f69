//! Fuzz target: dispense state machine under arbitrary sensor traces
//!
//! Each input bit answers one pellet-well read, so the beam can flicker
//! in any pattern mid-burst or mid-recovery.  Once the trace runs out the
//! well stays empty.  Verifies:
//! - `feed` always terminates (the burst ceiling holds)
//! - The motor is never stepped while disabled and is off on return
//! - Escalations fall on every fifth burst, in increasing order
//!
//! cargo fuzz run fuzz_dispense_sequence

#![no_main]

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;
use fed3::app::ports::{ClockPort, MotorPort, Rgbw, SensorPort, StimulusPort};
use fed3::config::FeederConfig;
use fed3::dispense::{DispenseController, JamStrategy};
use fed3::schedule::Side;
use libfuzzer_sys::fuzz_target;

struct Trace<'a> {
    bits: &'a [u8],
    read: usize,
    motor_on: bool,
    stepped_while_off: bool,
    now_ns: u64,
}

impl SensorPort for Trace<'_> {
    fn pellet_present(&mut self) -> bool {
        let (byte, bit) = (self.read / 8, self.read % 8);
        self.read += 1;
        self.bits.get(byte).is_some_and(|b| b & (1 << bit) != 0)
    }
    fn poke_pressed(&mut self, _side: Side) -> bool {
        false
    }
    fn battery_volts(&mut self) -> f32 {
        4.0
    }
}

impl MotorPort for Trace<'_> {
    fn enable_motor(&mut self) {
        self.motor_on = true;
    }
    fn step(&mut self, _steps: i32) {
        self.stepped_while_off |= !self.motor_on;
    }
    fn release_motor(&mut self) {
        self.motor_on = false;
    }
}

impl StimulusPort for Trace<'_> {
    fn tone(&mut self, _freq_hz: u32, _duration_ms: u32) {}
    fn set_pixel(&mut self, _index: usize, _colour: Rgbw) {}
    fn show_pixels(&mut self) {}
    fn sync_pulse(&mut self, _duration_ms: u32) {}
    fn blink_status(&mut self, _times: u8) {}
}

impl ClockPort for Trace<'_> {
    fn now(&self) -> NaiveDateTime {
        NaiveDateTime::default()
    }
    fn uptime_ms(&self) -> u64 {
        self.now_ns / 1_000_000
    }
}

impl DelayNs for Trace<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&seed, bits)) = data.split_first() else {
        return;
    };
    let mut hw = Trace {
        bits,
        read: 0,
        motor_on: false,
        stepped_while_off: false,
        now_ns: 0,
    };
    let config = FeederConfig::default();
    let ceiling = config.max_dispense_bursts;
    let mut ctl = DispenseController::new(config, u64::from(seed));

    let result = ctl.feed(&mut hw, &mut ());
    assert!(!hw.motor_on);
    assert!(!hw.stepped_while_off);

    let attempt = ctl.last_attempt();
    assert!(attempt.total_bursts <= ceiling);
    let mut last = 0;
    for &(burst, strategy) in &attempt.escalations {
        assert!(burst > last);
        assert_eq!(burst % 5, 0);
        last = burst;
        let counter = (burst - 1) % 20 + 1;
        assert_eq!(JamStrategy::for_burst(counter), Some(strategy));
    }
    if let Ok(report) = result {
        assert_eq!(report.bursts, attempt.total_bursts);
    }
});
