//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the control loop stops feeding it.  A dispense
//! blocks the loop for up to its wall-clock ceiling, so the timeout is
//! derived from the config rather than fixed.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use log::info;

use crate::config::FeederConfig;

/// Slack on top of the longest blocking operation.
const MARGIN_MS: u32 = 30_000;

/// Longest the loop may legitimately go without feeding.
pub fn timeout_ms(config: &FeederConfig) -> u32 {
    config
        .max_dispense_secs
        .saturating_mul(1_000)
        .saturating_add(config.sleep_interval_ms)
        .saturating_add(MARGIN_MS)
}

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout_ms: u32,
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the current task.
    pub fn new(config: &FeederConfig) -> Self {
        let timeout_ms = timeout_ms(config);

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task at boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }
                Self {
                    subscribed,
                    timeout_ms,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op ({} ms)", timeout_ms);
            Self { timeout_ms }
        }
    }

    /// Call once per control cycle.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: the current task was subscribed in new().
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    pub fn timeout(&self) -> u32 {
        self.timeout_ms
    }
}
