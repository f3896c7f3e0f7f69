//! Hardware adapter: bridges real peripherals to the domain port traits.
//!
//! Owns the [`SensorHub`] and every actuator driver, exposing them through
//! [`SensorPort`], [`MotorPort`], [`StimulusPort`], [`ClockPort`] and
//! `DelayNs`, which together make it a [`FeederHardware`].  This is the
//! only module in the system that touches actual hardware.  On non-espidf
//! targets the drivers use cfg-gated simulation stubs.
//!
//! [`FeederHardware`]: crate::app::ports::FeederHardware

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;

use crate::adapters::time::RtcClock;
use crate::app::ports::{ClockPort, MotorPort, Rgbw, SensorPort, StimulusPort};
use crate::drivers::buzzer::Buzzer;
use crate::drivers::pixels::PixelStrip;
use crate::drivers::signal_out::SignalOutputs;
use crate::drivers::stepper::StepperDriver;
use crate::schedule::Side;
use crate::sensors::SensorHub;

/// Blocking delay backed by the RTOS tick for whole milliseconds and a
/// busy-wait for the remainder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDelay;

impl DelayNs for SystemDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        use esp_idf_hal::delay::{Ets, FreeRtos};
        let ms = ns / 1_000_000;
        if ms > 0 {
            FreeRtos::delay_ms(ms);
        }
        let us = (ns % 1_000_000) / 1_000;
        if us > 0 {
            Ets::delay_us(us);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    sensors: SensorHub,
    stepper: StepperDriver,
    pixels: PixelStrip,
    buzzer: Buzzer,
    signals: SignalOutputs,
    clock: RtcClock,
    delay: SystemDelay,
}

impl HardwareAdapter {
    pub fn new(
        sensors: SensorHub,
        stepper: StepperDriver,
        pixels: PixelStrip,
        buzzer: Buzzer,
        signals: SignalOutputs,
        clock: RtcClock,
    ) -> Self {
        Self {
            sensors,
            stepper,
            pixels,
            buzzer,
            signals,
            clock,
            delay: SystemDelay,
        }
    }

    pub fn clock_mut(&mut self) -> &mut RtcClock {
        &mut self.clock
    }

    pub fn stepper(&self) -> &StepperDriver {
        &self.stepper
    }

    pub fn pixels(&self) -> &PixelStrip {
        &self.pixels
    }

    pub fn signals(&self) -> &SignalOutputs {
        &self.signals
    }

    pub fn buzzer(&self) -> &Buzzer {
        &self.buzzer
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn pellet_present(&mut self) -> bool {
        self.sensors.pellet_present()
    }

    fn poke_pressed(&mut self, side: Side) -> bool {
        self.sensors.poke(side)
    }

    fn battery_volts(&mut self) -> f32 {
        self.sensors.battery_volts()
    }
}

// ── MotorPort implementation ──────────────────────────────────

impl MotorPort for HardwareAdapter {
    fn enable_motor(&mut self) {
        self.stepper.enable();
    }

    fn step(&mut self, steps: i32) {
        self.stepper.step(steps, &mut self.delay);
    }

    fn release_motor(&mut self) {
        self.stepper.release();
    }
}

// ── StimulusPort implementation ───────────────────────────────

impl StimulusPort for HardwareAdapter {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        self.buzzer.tone(freq_hz, duration_ms);
    }

    fn set_pixel(&mut self, index: usize, colour: Rgbw) {
        self.pixels.set(index, colour);
    }

    fn show_pixels(&mut self) {
        self.pixels.show();
    }

    fn sync_pulse(&mut self, duration_ms: u32) {
        self.signals.sync_pulse(duration_ms, &mut self.delay);
    }

    fn blink_status(&mut self, times: u8) {
        self.signals.blink_status(times, &mut self.delay);
    }
}

// ── ClockPort / DelayNs ───────────────────────────────────────

impl ClockPort for HardwareAdapter {
    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}

impl DelayNs for HardwareAdapter {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::drivers::hw_init::sim;
    use crate::pins;

    fn adapter() -> HardwareAdapter {
        HardwareAdapter::new(
            SensorHub::new(),
            StepperDriver::new(1),
            PixelStrip::new(),
            Buzzer::new(),
            SignalOutputs::new(),
            RtcClock::new(),
        )
    }

    // One test owns the simulated pin table; the table is process-wide.
    #[test]
    fn ports_reach_the_simulated_pins() {
        let mut hw = adapter();

        assert!(!hw.pellet_present());
        sim::set_level(pins::PELLET_WELL_GPIO, false);
        assert!(hw.pellet_present());
        sim::set_level(pins::PELLET_WELL_GPIO, true);

        sim::set_level(pins::RIGHT_POKE_GPIO, false);
        assert!(hw.poke_pressed(Side::Right));
        assert!(!hw.poke_pressed(Side::Left));
        sim::set_level(pins::RIGHT_POKE_GPIO, true);

        hw.step(-4);
        assert_eq!(hw.stepper().position(), 0, "disabled driver ignores steps");
        hw.enable_motor();
        hw.step(-4);
        assert_eq!(hw.stepper().position(), -4);
        hw.release_motor();
        assert!(!hw.stepper().is_enabled());

        hw.tone(4_000, 300);
        assert_eq!(sim::buzzer_hz(), 4_000);
        assert_eq!(hw.buzzer().last_tone(), Some((4_000, 300)));

        hw.set_pixel(7, (0, 2, 2, 0));
        hw.show_pixels();
        assert_eq!(hw.pixels().shown()[7], (0, 2, 2, 0));

        hw.sync_pulse(1);
        hw.blink_status(2);
        assert_eq!(hw.signals().counts(), (1, 2));
        assert!(!sim::level(pins::BNC_OUT_GPIO));
    }
}
