//! Audio/visual stimulus sequences.
//!
//! Everything here blocks for the length of the sequence; call only from
//! the control loop.

use embedded_hal::delay::DelayNs;
use rand::Rng;

use crate::app::ports::{Rgbw, StimulusPort};
use crate::schedule::Side;

pub const PIXEL_COUNT: usize = 8;

pub const OFF: Rgbw = (0, 0, 0, 0);
pub const CYAN: Rgbw = (0, 2, 2, 0);
pub const FAULT_RED: Rgbw = (5, 0, 0, 0);
pub const TRACKING_CUE: Rgbw = (2, 0, 2, 2);

const CUE_TONE_HZ: u32 = 4_000;
const CUE_TONE_MS: u32 = 300;

/// Light pixels one at a time, `wait_ms` apart.  `reverse` runs from the
/// right-hand end.
pub fn color_wipe<H: StimulusPort + DelayNs>(hw: &mut H, colour: Rgbw, wait_ms: u32, reverse: bool) {
    for i in 0..PIXEL_COUNT {
        let index = if reverse { PIXEL_COUNT - 1 - i } else { i };
        hw.set_pixel(index, colour);
        hw.show_pixels();
        hw.delay_ms(wait_ms);
    }
}

/// Reward cue: tone plus a cyan wipe toward the rewarded side.
pub fn conditioned_stimulus<H: StimulusPort + DelayNs>(hw: &mut H, side: Side) {
    let reverse = side == Side::Right;
    hw.tone(CUE_TONE_HZ, CUE_TONE_MS);
    color_wipe(hw, CYAN, 40, reverse);
    color_wipe(hw, OFF, 20, reverse);
}

/// Burst of low random blips.
pub fn error_stimulus<H: StimulusPort + DelayNs, R: Rng>(hw: &mut H, rng: &mut R) {
    for _ in 0..30 {
        hw.tone(rng.gen_range(100..200), 20);
        hw.delay_ms(5);
    }
}

/// Light-tracking cue: a single pixel over the active poke.
pub fn tracking_cue<H: StimulusPort>(hw: &mut H, side: Side) {
    for i in 0..PIXEL_COUNT {
        hw.set_pixel(i, OFF);
    }
    let index = match side {
        Side::Left => 0,
        Side::Right => PIXEL_COUNT - 1,
    };
    hw.set_pixel(index, TRACKING_CUE);
    hw.show_pixels();
}

/// One round of the fatal-storage indication: `code` red flashes, then
/// dark wipes to fill a ten-slot frame.
pub fn fault_round<H: StimulusPort + DelayNs>(hw: &mut H, code: u8) {
    for _ in 0..code {
        hw.blink_status(2);
        color_wipe(hw, FAULT_RED, 25, false);
    }
    for _ in code..10 {
        color_wipe(hw, OFF, 25, false);
    }
}

/// Played once before a requested reset.
pub fn reset_sequence<H: StimulusPort + DelayNs>(hw: &mut H) {
    hw.tone(5_000, 400);
    hw.delay_ms(200);
    hw.tone(2_000, 300);
    hw.delay_ms(200);
    hw.tone(4_000, 600);
    for colour in [(2, 0, 0, 0), (2, 0, 2, 0), CYAN] {
        color_wipe(hw, colour, 40, false);
        hw.delay_ms(100);
    }
    color_wipe(hw, OFF, 20, false);
}
