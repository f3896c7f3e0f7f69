//! Digital signal outputs: the BNC sync line and the green status LED.
//!
//! Both are plain push-pull GPIO outputs; pulses block for their length.

use embedded_hal::delay::DelayNs;

use crate::drivers::hw_init;
use crate::pins;

const BLINK_MS: u32 = 25;

pub struct SignalOutputs {
    sync_pulses: u32,
    blinks: u32,
}

impl SignalOutputs {
    pub fn new() -> Self {
        hw_init::gpio_write(pins::BNC_OUT_GPIO, false);
        hw_init::gpio_write(pins::GREEN_LED_GPIO, false);
        Self {
            sync_pulses: 0,
            blinks: 0,
        }
    }

    /// Hold the BNC output high for `duration_ms`.
    pub fn sync_pulse<D: DelayNs>(&mut self, duration_ms: u32, delay: &mut D) {
        hw_init::gpio_write(pins::BNC_OUT_GPIO, true);
        delay.delay_ms(duration_ms);
        hw_init::gpio_write(pins::BNC_OUT_GPIO, false);
        self.sync_pulses += 1;
    }

    pub fn blink_status<D: DelayNs>(&mut self, times: u8, delay: &mut D) {
        for _ in 0..times {
            hw_init::gpio_write(pins::GREEN_LED_GPIO, true);
            delay.delay_ms(BLINK_MS);
            hw_init::gpio_write(pins::GREEN_LED_GPIO, false);
            delay.delay_ms(BLINK_MS);
        }
        self.blinks += u32::from(times);
    }

    /// `(sync pulses, status blinks)` since boot.
    pub fn counts(&self) -> (u32, u32) {
        (self.sync_pulses, self.blinks)
    }
}

impl Default for SignalOutputs {
    fn default() -> Self {
        Self::new()
    }
}
