//! Piezo buzzer driver.
//!
//! `tone` starts a square wave on LEDC channel 0 and returns at once; a
//! one-shot `esp_timer` silences it after the requested duration.  The
//! timer callback runs in the esp_timer task and only writes a zero duty.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: LEDC frequency/duty plus a one-shot esp_timer.
//! On host/test: the simulated buzzer frequency is set and the stop
//! deadline is only remembered.

use log::debug;

use crate::drivers::hw_init;

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tone_stop_cb(_arg: *mut core::ffi::c_void) {
    hw_init::buzzer_set(0);
}

pub struct Buzzer {
    #[cfg(target_os = "espidf")]
    stop_timer: esp_timer_handle_t,
    last_tone: Option<(u32, u32)>,
}

impl Buzzer {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        let mut stop_timer: esp_timer_handle_t = core::ptr::null_mut();
        let args = esp_timer_create_args_t {
            callback: Some(tone_stop_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"tone\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        // SAFETY: called once from the main task; the handle lives as long
        // as the Buzzer and the callback is a static fn.
        let ret = unsafe { esp_timer_create(&args, &mut stop_timer) };
        if ret != ESP_OK {
            log::error!("buzzer: stop timer create failed (rc={}), tones will not end", ret);
            stop_timer = core::ptr::null_mut();
        }
        Self {
            stop_timer,
            last_tone: None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { last_tone: None }
    }

    /// Start `freq_hz` for `duration_ms`.  A tone already playing is cut
    /// short and replaced.
    pub fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        debug!("buzzer: {} Hz for {} ms", freq_hz, duration_ms);
        hw_init::buzzer_set(freq_hz);
        self.last_tone = Some((freq_hz, duration_ms));

        #[cfg(target_os = "espidf")]
        if !self.stop_timer.is_null() {
            // SAFETY: the handle was created in new(); stopping an idle
            // timer returns ESP_ERR_INVALID_STATE, which is harmless.
            unsafe {
                esp_timer_stop(self.stop_timer);
                esp_timer_start_once(self.stop_timer, u64::from(duration_ms) * 1_000);
            }
        }
    }

    pub fn silence(&mut self) {
        hw_init::buzzer_set(0);
    }

    /// `(frequency, duration)` of the most recent tone.
    pub fn last_tone(&self) -> Option<(u32, u32)> {
        self.last_tone
    }
}

impl Default for Buzzer {
    fn default() -> Self {
        Self::new()
    }
}
