//! 4-wire unipolar stepper driver (28BYJ-48 behind a dual H-bridge).
//!
//! Full-step drive through four coil outputs plus a driver enable pin.
//! Coils are only written while the driver is enabled; `release` drops
//! every coil and the enable line so the motor draws nothing between
//! dispenses.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real GPIO via hw_init helpers.
//! On host/test: writes land in the simulated pin table.

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::drivers::hw_init;
use crate::pins;

/// Coil levels A, B, C, D for each of the four full-step phases.
const PHASES: [[bool; 4]; 4] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

pub struct StepperDriver {
    step_delay_us: u32,
    phase: usize,
    enabled: bool,
    /// Net full steps since boot; negative is the dispensing direction.
    position: i64,
}

impl StepperDriver {
    pub fn new(step_delay_us: u32) -> Self {
        Self {
            step_delay_us,
            phase: 0,
            enabled: false,
            position: 0,
        }
    }

    pub fn enable(&mut self) {
        hw_init::gpio_write(pins::MOTOR_ENABLE_GPIO, true);
        self.enabled = true;
    }

    /// Move `steps` full steps, blocking for `|steps| * step_delay`.
    /// Ignored while the driver is disabled.
    pub fn step<D: DelayNs>(&mut self, steps: i32, delay: &mut D) {
        if !self.enabled {
            trace!("stepper: {} steps ignored, driver disabled", steps);
            return;
        }
        let forward = steps > 0;
        for _ in 0..steps.unsigned_abs() {
            self.phase = if forward {
                (self.phase + 1) % PHASES.len()
            } else {
                (self.phase + PHASES.len() - 1) % PHASES.len()
            };
            self.write_coils(PHASES[self.phase]);
            delay.delay_us(self.step_delay_us);
        }
        self.position += i64::from(steps);
    }

    pub fn release(&mut self) {
        self.write_coils([false; 4]);
        hw_init::gpio_write(pins::MOTOR_ENABLE_GPIO, false);
        self.enabled = false;
    }

    fn write_coils(&self, levels: [bool; 4]) {
        for (pin, high) in pins::MOTOR_COIL_GPIOS.into_iter().zip(levels) {
            hw_init::gpio_write(pin, high);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn phase(&self) -> usize {
        self.phase
    }
}
