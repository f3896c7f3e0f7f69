//! Fuzz target: SD card settings files and the NVS config blob
//!
//! Splits the input into five "files", one per identity key, and feeds
//! them through the same parse path the SD adapter uses.  The rest of the
//! input is decoded as a postcard `FeederConfig`.  Verifies:
//! - No panics under arbitrary bytes
//! - The rebuilt identity is always in range (device ≤ 700, hours < 24)
//! - A decoded config that passes validation keeps its ceilings sane
//!
//! cargo fuzz run fuzz_settings_parse

#![no_main]

use std::collections::HashMap;

use fed3::adapters::nvs::validate_config;
use fed3::adapters::sd_card::{
    load_identity, parse_leading_int, DEVICE_NUMBER_KEY, MODE_KEY, RATIO_KEY, START_HOUR_KEY,
    STOP_HOUR_KEY,
};
use fed3::app::ports::{SettingsStore, StorageError};
use fed3::config::FeederConfig;
use libfuzzer_sys::fuzz_target;

const KEYS: [&str; 5] = [DEVICE_NUMBER_KEY, MODE_KEY, RATIO_KEY, START_HOUR_KEY, STOP_HOUR_KEY];

/// Settings files held as raw text, parsed on read like the SD adapter.
struct TextFiles(HashMap<&'static str, String>);

impl SettingsStore for TextFiles {
    fn read_setting(&self, key: &str) -> Result<Option<i32>, StorageError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(text) => parse_leading_int(text).map(Some).ok_or(StorageError::Malformed),
        }
    }

    fn write_setting(&mut self, _key: &str, _value: i32) -> Result<(), StorageError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut parts = data.split(|b| *b == 0);
    let mut files = HashMap::new();
    for key in KEYS {
        if let Some(raw) = parts.next() {
            files.insert(key, String::from_utf8_lossy(raw).into_owned());
        }
    }

    let identity = load_identity(&TextFiles(files));
    assert!(identity.device_number <= 700);
    assert!(identity.window.start_hour < 24);
    assert!(identity.window.end_hour < 24);

    let rest: Vec<u8> = parts.flatten().copied().collect();
    if let Ok(config) = postcard::from_bytes::<FeederConfig>(&rest) {
        if validate_config(&config).is_ok() {
            assert!(config.max_dispense_bursts > 40);
            assert!(config.burst_steps < 0);
        }
    }
});
