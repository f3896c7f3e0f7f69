//! NVS (Non-Volatile Storage) adapter for feeder tunables.
//!
//! Implements [`ConfigPort`].  The whole [`FeederConfig`] is stored as one
//! postcard blob under `fed3::feedcfg`; a missing or unreadable blob falls
//! back to defaults so a fresh board always boots.
//!
//! Every field is range-checked before it is written.  A value that would
//! let the motor spin forever or the recorder mislabel retrievals is
//! refused, never clamped.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::FeederConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

const CONFIG_NAMESPACE: &str = "fed3";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "feedcfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  On first boot or after a layout change the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns = CONFIG_NAMESPACE.as_bytes();
        ns_buf[..ns.len()].copy_from_slice(ns);

        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: ns_buf is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is not used after this.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Vec<u8>, i32> {
        Self::with_nvs_handle(false, |handle| {
            let key = b"feedcfg\0";
            let mut size: usize = 0;
            // SAFETY: a null buffer asks NVS for the stored size only.
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            // SAFETY: buf holds exactly `size` bytes.
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        })
    }
}

/// Range-check every field that can stall or corrupt a session.
pub fn validate_config(cfg: &FeederConfig) -> Result<(), ConfigError> {
    if cfg.burst_steps >= 0 || cfg.burst_steps < -500 {
        return Err(ConfigError::ValidationFailed(
            "burst_steps must be -500..-1",
        ));
    }
    if cfg.burst_step_calls == 0 {
        return Err(ConfigError::ValidationFailed("burst_step_calls must be > 0"));
    }
    if !(1..=1000).contains(&cfg.dispense_poll_ms) || cfg.dispense_poll_count == 0 {
        return Err(ConfigError::ValidationFailed(
            "dispense poll must be 1–1000 ms with a non-zero count",
        ));
    }
    if cfg.full_clear_min_cycles == 0 {
        return Err(ConfigError::ValidationFailed(
            "full_clear_min_cycles must be > 0",
        ));
    }
    if cfg.max_dispense_bursts <= 40 {
        return Err(ConfigError::ValidationFailed(
            "max_dispense_bursts must exceed the last full clear (40)",
        ));
    }
    if !(30..=3600).contains(&cfg.max_dispense_secs) {
        return Err(ConfigError::ValidationFailed(
            "max_dispense_secs must be 30–3600",
        ));
    }
    if !(1..=3600).contains(&cfg.retrieval_timeout_secs) {
        return Err(ConfigError::ValidationFailed(
            "retrieval_timeout_secs must be 1–3600",
        ));
    }
    if !(100..=10_000).contains(&cfg.reset_hold_ms) {
        return Err(ConfigError::ValidationFailed(
            "reset_hold_ms must be 100–10000",
        ));
    }
    if !(50..=60_000).contains(&cfg.sleep_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "sleep_interval_ms must be 50–60000",
        ));
    }
    if cfg.steps_per_rev == 0 || !(1..=30).contains(&cfg.stepper_rpm) {
        return Err(ConfigError::ValidationFailed(
            "stepper geometry must be non-zero with 1–30 rpm",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(bytes) = self.store.borrow().get(&Self::composite_key()) {
                let cfg: FeederConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(FeederConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::read_blob() {
                Ok(bytes) => {
                    let cfg: FeederConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(FeederConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(FeederConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(Self::composite_key(), bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let key = b"feedcfg\0";
                // SAFETY: bytes outlives the call; NVS copies the blob.
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                // SAFETY: handle is open read-write.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
