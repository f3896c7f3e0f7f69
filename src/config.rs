//! Feeder configuration parameters
//!
//! All tunable parameters for the dispense mechanism, session recorder and
//! control loop.  Values can be overridden via NVS (non-volatile storage);
//! the per-session identity (device number, mode, timed window) lives on
//! the SD card instead, see [`crate::adapters::sd_card`].

use serde::{Deserialize, Serialize};

/// Core feeder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Dispense: stepping ---
    /// Steps per burst call (negative = dispensing direction)
    pub burst_steps: i32,
    /// Burst calls per burst, each skipped once the pellet is seen
    pub burst_step_calls: u8,
    /// Sensor poll cadence after each burst (milliseconds)
    pub dispense_poll_ms: u32,
    /// Sensor polls after each burst before the next burst
    pub dispense_poll_count: u16,

    // --- Dispense: jam recovery ---
    /// Forward nudge applied by the minor jam strategy
    pub minor_jam_steps: i32,
    /// Oscillation cycles of the vibrate strategy
    pub vibrate_cycles: u8,
    /// Forward steps of one vibrate cycle
    pub vibrate_forward_steps: i32,
    /// Reverse steps of one vibrate cycle
    pub vibrate_back_steps: i32,
    /// Minimum rotation cycles of the full clear strategy
    pub full_clear_min_cycles: u8,
    /// Random extra cycles added to the minimum (exclusive upper bound)
    pub full_clear_extra_cycles: u8,
    /// Step growth per full-clear cycle
    pub full_clear_step_scale: i32,
    /// Settle delay before any jam-recovery motion (milliseconds)
    pub jam_settle_ms: u32,

    // --- Dispense: ceiling ---
    /// Bursts after which the dispense is abandoned as a hardware fault
    pub max_dispense_bursts: u32,
    /// Wall-clock budget for one dispense (seconds)
    pub max_dispense_secs: u32,

    // --- Session ---
    /// Retrieval intervals longer than this are logged as timed out (seconds)
    pub retrieval_timeout_secs: u32,
    /// Sync output pulse length on pellet removal (milliseconds)
    pub sync_pulse_ms: u32,
    /// Both pokes held this long requests a device reset (milliseconds)
    pub reset_hold_ms: u32,

    // --- Timing ---
    /// Low-power wait between control cycles (milliseconds)
    pub sleep_interval_ms: u32,

    // --- Stepper geometry ---
    /// Full steps per output shaft revolution
    pub steps_per_rev: u16,
    /// Stepper speed (revolutions per minute)
    pub stepper_rpm: u16,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Stepping
            burst_steps: -30,
            burst_step_calls: 9,
            dispense_poll_ms: 10,
            dispense_poll_count: 299, // ~3 s per burst

            // Jam recovery
            minor_jam_steps: 100,
            vibrate_cycles: 30,
            vibrate_forward_steps: 120,
            vibrate_back_steps: 60,
            full_clear_min_cycles: 21,
            full_clear_extra_cycles: 20,
            full_clear_step_scale: 4,
            jam_settle_ms: 250,

            // Ceiling
            max_dispense_bursts: 80,
            max_dispense_secs: 600,

            // Session
            retrieval_timeout_secs: 120,
            sync_pulse_ms: 500,
            reset_hold_ms: 1000,

            // Timing
            sleep_interval_ms: 1000,

            // 28BYJ-48 geared stepper
            steps_per_rev: 2038,
            stepper_rpm: 12,
        }
    }
}

impl FeederConfig {
    /// Delay between coil phases for the configured speed (microseconds).
    pub fn step_delay_us(&self) -> u32 {
        let steps_per_min = u32::from(self.steps_per_rev) * u32::from(self.stepper_rpm.max(1));
        60_000_000 / steps_per_min.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = FeederConfig::default();
        assert!(c.burst_steps < 0, "dispensing rotates in the negative direction");
        assert!(c.burst_step_calls > 0);
        assert!(c.dispense_poll_ms > 0 && c.dispense_poll_count > 0);
        assert!(c.full_clear_min_cycles > 0);
        assert!(c.max_dispense_bursts > 0);
        assert!(c.retrieval_timeout_secs > 0);
    }

    #[test]
    fn ceiling_leaves_room_for_every_escalation() {
        let c = FeederConfig::default();
        assert!(
            c.max_dispense_bursts > 40,
            "the ceiling must not cut off the last full clear"
        );
        let burst_secs = c.dispense_poll_ms * u32::from(c.dispense_poll_count) / 1000;
        assert!(c.max_dispense_secs > burst_secs * 40);
    }

    #[test]
    fn step_delay_matches_twelve_rpm() {
        let c = FeederConfig::default();
        // 2038 steps * 12 rpm = 24456 steps/min
        assert_eq!(c.step_delay_us(), 2453);
    }

    #[test]
    fn serde_roundtrip() {
        let c = FeederConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: FeederConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = FeederConfig {
            max_dispense_bursts: 60,
            ..FeederConfig::default()
        };
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: FeederConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c2.max_dispense_bursts, 60);
        assert_eq!(c2.burst_steps, -30);
    }
}
