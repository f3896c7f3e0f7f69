//! Battery gauge: LiPo terminal voltage through a 1:2 divider on ADC1.
//!
//! A short ring buffer smooths the motor-induced sag so the value logged
//! with each record does not jump between adjacent rows.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the battery channel via the oneshot API (hw_init).
//! On host/test: reads the simulated ADC value.

use crate::drivers::hw_init;
use crate::pins;

const RING_BUF_CAP: usize = 4;
const ADC_FULL_SCALE: f32 = 4095.0;
const ADC_REF_VOLTS: f32 = 3.3;
const DIVIDER: f32 = 2.0;

/// Bar thresholds for the status screen, highest first.
pub const BAR_THRESHOLDS: [f32; 3] = [3.85, 3.70, 3.55];

/// Convert a 12-bit reading to terminal volts.
pub fn volts_from_raw(raw: u16) -> f32 {
    f32::from(raw) * DIVIDER * ADC_REF_VOLTS / ADC_FULL_SCALE
}

/// Filled bars (0–4) for `volts`.
pub fn bars(volts: f32) -> u8 {
    1 + BAR_THRESHOLDS.iter().filter(|&&t| volts > t).count() as u8
}

pub struct BatterySensor {
    ring: [f32; RING_BUF_CAP],
    head: usize,
    count: usize,
}

impl BatterySensor {
    pub fn new() -> Self {
        Self {
            ring: [0.0; RING_BUF_CAP],
            head: 0,
            count: 0,
        }
    }

    /// Sample the ADC and return the smoothed voltage.
    pub fn read(&mut self) -> f32 {
        let volts = volts_from_raw(hw_init::adc1_read(pins::BATTERY_ADC_CHANNEL));
        self.push(volts)
    }

    fn push(&mut self, volts: f32) -> f32 {
        self.ring[self.head] = volts;
        self.head = (self.head + 1) % RING_BUF_CAP;
        self.count = (self.count + 1).min(RING_BUF_CAP);
        self.ring[..self.count].iter().sum::<f32>() / self.count as f32
    }
}

impl Default for BatterySensor {
    fn default() -> Self {
        Self::new()
    }
}
