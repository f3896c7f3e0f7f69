//! SD card adapter: session log files and key/value settings files.
//!
//! Implements [`LogStore`] and [`SettingsStore`] on top of `std::fs`
//! under a mount root (`/sdcard` on the device, any directory on the
//! host).  The FAT volume itself is mounted by `main` through esp-idf-svc
//! before this adapter is built.
//!
//! Settings are one small integer per file, rewritten wholesale:
//!
//! | File               | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `DeviceNumber.csv` | device number, 0–700                      |
//! | `FEDmode.csv`      | menu mode index, 0–11                     |
//! | `FRsize.csv`       | fixed-ratio size when it is not 1, 3 or 5 |
//! | `start.csv`        | timed-feeding start hour                  |
//! | `stop.csv`         | timed-feeding end hour                    |

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::{LogStore, SettingsStore, StorageError};
use crate::app::state::{DeviceIdentity, TimedWindow};
use crate::menu::LAST_HOUR;
use crate::schedule::ScheduleMode;

pub const DEVICE_NUMBER_KEY: &str = "DeviceNumber.csv";
pub const MODE_KEY: &str = "FEDmode.csv";
pub const RATIO_KEY: &str = "FRsize.csv";
pub const START_HOUR_KEY: &str = "start.csv";
pub const STOP_HOUR_KEY: &str = "stop.csv";

/// Mount point of the FAT volume on the device.
pub const MOUNT_POINT: &str = "/sdcard";

pub struct SdCard {
    root: PathBuf,
    current: Option<File>,
}

impl SdCard {
    /// Use the already-mounted volume at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {
                info!("SdCard: using {}", root.display());
                Ok(Self {
                    root,
                    current: None,
                })
            }
            _ => {
                warn!("SdCard: {} is not mounted", root.display());
                Err(StorageError::Unavailable)
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl LogStore for SdCard {
    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path(name))
            .map_err(|e| {
                warn!("SdCard: create {} failed: {}", name, e);
                StorageError::OpenFailed
            })?;
        self.current = Some(file);
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        let file = self.current.as_mut().ok_or(StorageError::NotOpen)?;
        writeln!(file, "{line}").map_err(|_| StorageError::WriteFailed)?;
        file.sync_data().map_err(|_| StorageError::WriteFailed)
    }
}

impl SettingsStore for SdCard {
    fn read_setting(&self, key: &str) -> Result<Option<i32>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => parse_leading_int(&text)
                .map(Some)
                .ok_or(StorageError::Malformed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(StorageError::OpenFailed),
        }
    }

    fn write_setting(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        let mut file = File::create(self.path(key)).map_err(|_| StorageError::OpenFailed)?;
        write!(file, "{value}").map_err(|_| StorageError::WriteFailed)?;
        file.sync_all().map_err(|_| StorageError::WriteFailed)?;
        debug!("SdCard: {} = {}", key, value);
        Ok(())
    }
}

/// First integer in `text`, skipping anything before it.  A `-` directly
/// in front of the digits makes it negative.
pub fn parse_leading_int(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let negative = start > 0 && bytes[start - 1] == b'-';
    let mut value: i32 = 0;
    for &b in bytes[start..].iter().take_while(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(i32::from(b - b'0'));
    }
    Some(if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// Identity persistence
// ---------------------------------------------------------------------------

fn setting_or<S: SettingsStore>(store: &S, key: &str, default: i32) -> i32 {
    match store.read_setting(key) {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => {
            warn!("settings: {} unreadable ({}), using {}", key, e, default);
            default
        }
    }
}

/// Rebuild the session identity from the settings files.  Missing or
/// out-of-range values fall back to defaults.
pub fn load_identity<S: SettingsStore>(store: &S) -> DeviceIdentity {
    let fallback = DeviceIdentity::default();
    let device_number = u16::try_from(setting_or(store, DEVICE_NUMBER_KEY, 0)).unwrap_or(0);

    let hour = |key: &str, default: u8| {
        u8::try_from(setting_or(store, key, i32::from(default)))
            .ok()
            .filter(|h| *h <= LAST_HOUR)
            .unwrap_or(default)
    };
    let window = TimedWindow {
        start_hour: hour(START_HOUR_KEY, fallback.window.start_hour),
        end_hour: hour(STOP_HOUR_KEY, fallback.window.end_hour),
    };

    let index = u8::try_from(setting_or(store, MODE_KEY, 0)).unwrap_or(0);
    let mode = match ScheduleMode::from_index(index, window.start_hour, window.end_hour) {
        Some(ScheduleMode::FixedRatio(3)) => {
            let n = u16::try_from(setting_or(store, RATIO_KEY, 3))
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(3);
            ScheduleMode::FixedRatio(n)
        }
        Some(mode) => mode,
        None => {
            warn!("settings: mode index {} unknown, using free feeding", index);
            fallback.mode
        }
    };

    DeviceIdentity::new(device_number, mode, window)
}

/// Write every identity file.
pub fn save_identity<S: SettingsStore>(
    store: &mut S,
    identity: &DeviceIdentity,
) -> Result<(), StorageError> {
    store.write_setting(DEVICE_NUMBER_KEY, i32::from(identity.device_number))?;
    store.write_setting(MODE_KEY, i32::from(identity.mode.to_index()))?;
    if let ScheduleMode::FixedRatio(n) = identity.mode {
        store.write_setting(RATIO_KEY, i32::from(n))?;
    }
    store.write_setting(START_HOUR_KEY, i32::from(identity.window.start_hour))?;
    store.write_setting(STOP_HOUR_KEY, i32::from(identity.window.end_hour))?;
    info!(
        "settings: saved device {:03} mode {}",
        identity.device_number,
        identity.mode.session_label(0)
    );
    Ok(())
}
