//! Interrupt-cancellable low-power wait between control cycles.
//!
//! On the device the CPU enters light sleep with two wake sources: a
//! timer for the cycle interval and GPIO level wake on all three beam
//! inputs, armed on the level opposite to the one currently read.  Any
//! beam transition therefore ends the sleep immediately.  GPIO wake is
//! level based and may not latch the edge ISR, which is fine because the
//! next cycle re-reads every pin.
//!
//! Host builds poll the capture's wake flag in short slices instead.

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::config::FeederConfig;
use crate::events::EventCapture;

/// Host poll granularity.
#[cfg(not(target_os = "espidf"))]
const POLL_SLICE_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A beam interrupt fired, before or during the wait.
    Interrupt,
    /// The full interval elapsed.
    Timer,
}

pub struct PowerManager {
    interval_ms: u32,
    sleeps: u64,
    early_wakes: u64,
}

impl PowerManager {
    pub fn new(config: &FeederConfig) -> Self {
        Self {
            interval_ms: config.sleep_interval_ms,
            sleeps: 0,
            early_wakes: 0,
        }
    }

    /// Block until the interval elapses or any beam interrupt fires.
    /// Returns without sleeping if an interrupt is already pending.
    pub fn wait<D: DelayNs>(&mut self, capture: &EventCapture, delay: &mut D) -> WakeReason {
        if capture.wake_pending() {
            self.early_wakes += 1;
            return WakeReason::Interrupt;
        }
        self.sleeps += 1;
        let reason = self.sleep(capture, delay);
        if reason == WakeReason::Interrupt {
            self.early_wakes += 1;
        }
        trace!("power: woke by {:?}", reason);
        reason
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// `(sleeps entered, waits cut short by an interrupt)`.
    pub fn stats(&self) -> (u64, u64) {
        (self.sleeps, self.early_wakes)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep<D: DelayNs>(&mut self, capture: &EventCapture, delay: &mut D) -> WakeReason {
        let mut waited = 0;
        while waited < self.interval_ms {
            let slice = POLL_SLICE_MS.min(self.interval_ms - waited);
            delay.delay_ms(slice);
            waited += slice;
            if capture.wake_pending() {
                return WakeReason::Interrupt;
            }
        }
        WakeReason::Timer
    }

    #[cfg(target_os = "espidf")]
    fn sleep<D: DelayNs>(&mut self, capture: &EventCapture, _delay: &mut D) -> WakeReason {
        use crate::drivers::hw_init::gpio_read;
        use crate::pins;
        use esp_idf_sys::*;

        let inputs = [pins::PELLET_WELL_GPIO, pins::LEFT_POKE_GPIO, pins::RIGHT_POKE_GPIO];
        // SAFETY: main-task only; the wake sources are re-armed every call
        // and the pins were configured as inputs in hw_init.
        let cause = unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(self.interval_ms) * 1_000);
            for pin in inputs {
                let level = if gpio_read(pin) {
                    gpio_int_type_t_GPIO_INTR_LOW_LEVEL
                } else {
                    gpio_int_type_t_GPIO_INTR_HIGH_LEVEL
                };
                gpio_wakeup_enable(pin, level);
            }
            esp_sleep_enable_gpio_wakeup();
            esp_light_sleep_start();
            for pin in inputs {
                gpio_wakeup_disable(pin);
            }
            esp_sleep_get_wakeup_cause()
        };

        if cause == esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO || capture.wake_pending() {
            WakeReason::Interrupt
        } else {
            WakeReason::Timer
        }
    }
}
