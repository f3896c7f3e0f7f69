//! GRBW NeoPixel strip over the poke holes.
//!
//! Colours are staged in a frame buffer by `set` and pushed to the strip
//! by `show`.  Each pixel goes out as four bytes, G R B W, MSB first, with
//! SK6812 timing generated by an RMT channel.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: transmits through an esp-idf-hal `TxRmtDriver`.
//! On host/test: `show` copies the staged frame to `shown()`.

use log::warn;

use crate::app::ports::Rgbw;
use crate::pins::NEOPIXEL_COUNT;

#[cfg(target_os = "espidf")]
use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};

#[cfg(target_os = "espidf")]
const BITS_PER_PIXEL: usize = 32;

/// Wire order for one pixel.
pub fn wire_bytes((r, g, b, w): Rgbw) -> [u8; 4] {
    [g, r, b, w]
}

pub struct PixelStrip {
    staged: [Rgbw; NEOPIXEL_COUNT],
    shown: [Rgbw; NEOPIXEL_COUNT],
    #[cfg(target_os = "espidf")]
    tx: TxRmtDriver<'static>,
}

impl PixelStrip {
    #[cfg(target_os = "espidf")]
    pub fn new(tx: TxRmtDriver<'static>) -> Self {
        Self {
            staged: [(0, 0, 0, 0); NEOPIXEL_COUNT],
            shown: [(0, 0, 0, 0); NEOPIXEL_COUNT],
            tx,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            staged: [(0, 0, 0, 0); NEOPIXEL_COUNT],
            shown: [(0, 0, 0, 0); NEOPIXEL_COUNT],
        }
    }

    /// Stage `colour` at `index`; out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, colour: Rgbw) {
        if let Some(px) = self.staged.get_mut(index) {
            *px = colour;
        }
    }

    pub fn show(&mut self) {
        if let Err(e) = self.transmit() {
            warn!("pixels: transmit failed: {}", e);
            return;
        }
        self.shown = self.staged;
    }

    /// Frame most recently pushed to the strip.
    pub fn shown(&self) -> &[Rgbw; NEOPIXEL_COUNT] {
        &self.shown
    }

    #[cfg(target_os = "espidf")]
    fn transmit(&mut self) -> Result<(), esp_idf_sys::EspError> {
        use core::time::Duration;

        let ticks_hz = self.tx.counter_clock()?;
        let t0h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(300))?;
        let t0l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(900))?;
        let t1h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(600))?;
        let t1l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(600))?;

        let mut signal = FixedLengthSignal::<{ NEOPIXEL_COUNT * BITS_PER_PIXEL }>::new();
        let mut slot = 0;
        for px in self.staged {
            for byte in wire_bytes(px) {
                for bit in (0..8).rev() {
                    let pair = if byte >> bit & 1 == 1 { (t1h, t1l) } else { (t0h, t0l) };
                    signal.set(slot, &pair)?;
                    slot += 1;
                }
            }
        }
        self.tx.start_blocking(&signal)
    }

    #[cfg(not(target_os = "espidf"))]
    fn transmit(&mut self) -> Result<(), &'static str> {
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for PixelStrip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn wire_order_is_grbw() {
        assert_eq!(wire_bytes((1, 2, 3, 4)), [2, 1, 3, 4]);
    }

    #[test]
    fn staged_colours_appear_only_after_show() {
        let mut strip = PixelStrip::new();
        strip.set(0, (0, 2, 2, 0));
        strip.set(NEOPIXEL_COUNT, (9, 9, 9, 9));
        assert_eq!(strip.shown()[0], (0, 0, 0, 0));
        strip.show();
        assert_eq!(strip.shown()[0], (0, 2, 2, 0));
    }
}
