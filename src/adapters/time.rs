//! Calendar and monotonic time adapter.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`;
//!   calendar time from the system clock, which the ESP32 RTC keeps
//!   running across light sleep and soft resets.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and the host's
//!   local clock.

use chrono::{Local, NaiveDateTime};

use crate::app::ports::ClockPort;

/// Any wall clock earlier than this has never been set.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct RtcClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for RtcClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a read of the always-running
        // high-resolution timer.
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Whether the wall clock has been set since the RTC lost power.
    pub fn is_set(&self) -> bool {
        Local::now().timestamp() >= EPOCH_2020
    }

    /// Set the system wall clock, e.g. from a build timestamp on first boot.
    #[cfg(target_os = "espidf")]
    pub fn set(&mut self, time: NaiveDateTime) -> bool {
        let tv = esp_idf_sys::timeval {
            tv_sec: time.and_utc().timestamp() as esp_idf_sys::time_t,
            tv_usec: 0,
        };
        // SAFETY: tv is a valid timeval; a null timezone is allowed.
        (unsafe { esp_idf_sys::settimeofday(&tv, core::ptr::null()) }) == 0
    }
}

impl ClockPort for RtcClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }
}
