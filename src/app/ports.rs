//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederService (domain)
//! ```
//!
//! Driven adapters (sensors, motor, stimuli, storage, display) implement
//! these traits.  The [`FeederService`](super::service::FeederService) and
//! the dispense controller consume them via generics, so the domain core
//! never touches hardware directly.
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **LogStore::append_line** MUST flush before returning; a record that
//!   returned `Ok` survives a power cut.
//! - All port errors are typed; callers must handle every variant explicitly.

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;

use crate::config::FeederConfig;
use crate::schedule::Side;

/// NeoPixel colour as (R, G, B, W) intensities; the driver reorders to
/// the strip's GRBW wire format.
pub type Rgbw = (u8, u8, u8, u8);

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Live pin reads.  Every control cycle re-derives truth from these, so a
/// missed or spurious interrupt is corrected on the next pass.
pub trait SensorPort {
    /// Pellet well beam broken (pin LOW).
    fn pellet_present(&mut self) -> bool;

    /// Poke beam broken (pin LOW) on `side`.
    fn poke_pressed(&mut self, side: Side) -> bool;

    /// Battery terminal voltage.
    fn battery_volts(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Motor port (driven adapter: domain → stepper)
// ───────────────────────────────────────────────────────────────

pub trait MotorPort {
    /// Energise the driver.  Must precede any `step`.
    fn enable_motor(&mut self);

    /// Move `steps` full steps; negative rotates the dispensing direction.
    /// Blocks until the motion completes.
    fn step(&mut self, steps: i32);

    /// De-energise every coil and the driver enable.
    fn release_motor(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Stimulus port (driven adapter: domain → buzzer / pixels / BNC)
// ───────────────────────────────────────────────────────────────

pub trait StimulusPort {
    /// Start a tone; returns immediately.
    fn tone(&mut self, freq_hz: u32, duration_ms: u32);

    /// Stage a pixel colour; takes effect on [`show_pixels`](Self::show_pixels).
    fn set_pixel(&mut self, index: usize, colour: Rgbw);

    fn show_pixels(&mut self);

    /// Drive the BNC sync output high for `duration_ms`.
    fn sync_pulse(&mut self, duration_ms: u32);

    /// Blink the green status LED `times` times.
    fn blink_status(&mut self, times: u8);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Calendar time from the RTC.
    fn now(&self) -> NaiveDateTime;

    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

/// Everything the control loop drives during a cycle.
///
/// Collapsing the ports into one bound avoids a double mutable borrow when
/// the dispense controller reads the sensor between motor moves.
pub trait FeederHardware: SensorPort + MotorPort + StimulusPort + ClockPort + DelayNs {}

impl<T> FeederHardware for T where T: SensorPort + MotorPort + StimulusPort + ClockPort + DelayNs {}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: presentation → memory LCD)
// ───────────────────────────────────────────────────────────────

/// Monochrome ink for the memory LCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Black,
    White,
}

/// Render primitives.  Drawing is buffered until [`refresh`](Self::refresh).
pub trait DisplayPort {
    fn clear(&mut self);
    fn text(&mut self, x: i16, y: i16, size: u8, text: &str);
    fn fill_rect(&mut self, x: i16, y: i16, w: i16, h: i16, ink: Ink);
    fn stroke_rect(&mut self, x: i16, y: i16, w: i16, h: i16, ink: Ink);
    fn circle(&mut self, x: i16, y: i16, r: i16, ink: Ink, filled: bool);
    fn triangle(&mut self, points: [(i16, i16); 3], ink: Ink);
    fn line(&mut self, from: (i16, i16), to: (i16, i16), ink: Ink);
    fn refresh(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / presentation)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, status
/// screen, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Discard every event.
impl EventSink for () {
    fn emit(&mut self, _event: &super::events::AppEvent) {}
}

/// Fan-out: deliver every event to both sinks in order.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Session log storage (driven adapter: domain → SD card)
// ───────────────────────────────────────────────────────────────

/// Append-only session log.
pub trait LogStore {
    /// Whether a file with this name already exists.
    fn exists(&self, name: &str) -> bool;

    /// Create (or truncate) the session file and make it current.
    fn create(&mut self, name: &str) -> Result<(), StorageError>;

    /// Append one line to the current file and flush it.
    fn append_line(&mut self, line: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Settings storage (driven adapter: domain ↔ SD card key/value files)
// ───────────────────────────────────────────────────────────────

/// Small integer settings, one file per key, rewritten wholesale.
pub trait SettingsStore {
    /// `Ok(None)` if the key has never been written.
    fn read_setting(&self, key: &str) -> Result<Option<i32>, StorageError>;

    fn write_setting(&mut self, key: &str, value: i32) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Loads and persists feeder tunables.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`LogStore`] and [`SettingsStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The card is missing or failed to mount.
    Unavailable,
    /// A file could not be created or opened.
    OpenFailed,
    /// A write or flush failed.
    WriteFailed,
    /// No session file is open.
    NotOpen,
    /// A stored value could not be parsed.
    Malformed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::OpenFailed => write!(f, "file open failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::NotOpen => write!(f, "no file open"),
            Self::Malformed => write!(f, "malformed value"),
        }
    }
}
