//! Mutable context threaded through every dispense state handler.
//!
//! Holds the tunables, the PRNG for full-clear sweeps, and the
//! [`DispenseAttempt`] bookkeeping for the feed in progress.

use rand::rngs::SmallRng;

use super::JamStrategy;
use crate::config::FeederConfig;
use crate::error::DispenseFault;

/// Transient per-feed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispenseAttempt {
    /// Absolute motor steps commanded, recovery motions included.
    pub steps_issued: u64,
    /// Escalation counter; a full clear resets it to 0.
    pub bursts: u32,
    /// Bursts since the feed began, never reset.
    pub total_bursts: u32,
    /// Vibrate and full-clear recoveries run.
    pub jam_clears: u32,
    /// Uptime at which the feed began.
    pub started_ms: u64,
    pub escalations: heapless::Vec<(u32, JamStrategy), 32>,
}

pub struct DispenseContext {
    pub config: FeederConfig,
    pub rng: SmallRng,
    pub attempt: DispenseAttempt,
    /// Set by the stepping handler when a ceiling is hit.
    pub fault: Option<DispenseFault>,
}

impl DispenseContext {
    pub fn new(config: FeederConfig, rng: SmallRng) -> Self {
        Self {
            config,
            rng,
            attempt: DispenseAttempt::default(),
            fault: None,
        }
    }

    /// Reset per-feed bookkeeping.
    pub fn begin(&mut self, now_ms: u64) {
        self.attempt = DispenseAttempt {
            started_ms: now_ms,
            ..DispenseAttempt::default()
        };
        self.fault = None;
    }

    pub fn record_escalation(&mut self, strategy: JamStrategy) {
        let burst = self.attempt.total_bursts;
        // Capacity exceeds what the default ceiling can produce; overflow is
        // dropped from the report only.
        let _ = self.attempt.escalations.push((burst, strategy));
    }

    /// Ceiling check after a burst.  Records and returns the fault, if any.
    pub fn check_ceiling(&mut self, now_ms: u64) -> Option<DispenseFault> {
        let elapsed_ms = now_ms.saturating_sub(self.attempt.started_ms);
        let fault = if self.attempt.total_bursts >= self.config.max_dispense_bursts {
            Some(DispenseFault::ExceededAttempts {
                bursts: self.attempt.total_bursts,
            })
        } else if elapsed_ms > u64::from(self.config.max_dispense_secs) * 1000 {
            Some(DispenseFault::ExceededDuration { elapsed_ms })
        } else {
            None
        };
        self.fault = fault;
        fault
    }
}
