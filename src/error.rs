//! Unified error types for the FED3 firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level control loop's error handling uniform.  All variants are `Copy`
//! so they can be passed through the dispense state machine and the event
//! sink without allocation.
//!
//! | Condition              | Variant                      | Handling                      |
//! |------------------------|------------------------------|-------------------------------|
//! | Storage unavailable    | `Storage(..)`                | fatal at boot, fault loop     |
//! | Dispense ceiling hit   | `Dispense(..)`               | recoverable, retried next cycle |
//! | Sensor glitch          | `Sensor(..)`                 | tolerated, re-read next cycle |

use core::fmt;

pub use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session log or settings storage could not be used.
    Storage(StorageError),
    /// A dispense exceeded its configured ceiling.
    Dispense(DispenseFault),
    /// A sensor reading was implausible.
    Sensor(SensorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Dispense(e) => write!(f, "dispense: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl Error {
    /// Number of red wipes shown by the fault indicator for this error.
    ///
    /// Matches the blink codes printed on the device label: 2 = card
    /// failed to mount, 3 = session file could not be opened.
    pub fn blink_code(&self) -> u8 {
        match self {
            Self::Storage(StorageError::Unavailable) => 2,
            Self::Storage(_) => 3,
            Self::Dispense(_) => 4,
            Self::Sensor(_) => 5,
            Self::Init(_) | Self::Config(_) => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispense faults
// ---------------------------------------------------------------------------

/// Why a dispense attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseFault {
    /// The burst ceiling was reached with the well still empty.
    ExceededAttempts { bursts: u32 },
    /// The wall-clock ceiling was reached with the well still empty.
    ExceededDuration { elapsed_ms: u64 },
}

impl fmt::Display for DispenseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceededAttempts { bursts } => {
                write!(f, "pellet not delivered after {bursts} bursts")
            }
            Self::ExceededDuration { elapsed_ms } => {
                write!(f, "pellet not delivered after {elapsed_ms} ms")
            }
        }
    }
}

impl From<DispenseFault> for Error {
    fn from(e: DispenseFault) -> Self {
        Self::Dispense(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// The live pin level disagreed with the latched interrupt state.
    StaleEdge,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::StaleEdge => write!(f, "pin level disagrees with latched edge"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
