//! GPIO / peripheral pin assignments for the FED3 main board (ESP32-S3 port).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Beam-break sensors (active-low, external pull-ups)
// ---------------------------------------------------------------------------

/// Pellet well IR beam.  LOW = pellet present (beam broken).
pub const PELLET_WELL_GPIO: i32 = 4;
/// Left nose-poke IR beam.  LOW = poke in progress.
pub const LEFT_POKE_GPIO: i32 = 5;
/// Right nose-poke IR beam.  LOW = poke in progress.
pub const RIGHT_POKE_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Stepper motor (ULN2003 / DRV8833 dual H-bridge)
// ---------------------------------------------------------------------------

/// Driver enable.  HIGH = coils may be energised.
pub const MOTOR_ENABLE_GPIO: i32 = 7;
/// Coil outputs in phase order A, B, C, D.
pub const MOTOR_COIL_GPIOS: [i32; 4] = [15, 16, 17, 18];

// ---------------------------------------------------------------------------
// Stimulus outputs
// ---------------------------------------------------------------------------

/// Piezo buzzer, driven by LEDC channel 0.
pub const BUZZER_GPIO: i32 = 8;
/// 8-pixel GRBW NeoPixel strip data line (RMT channel 0).
pub const NEOPIXEL_GPIO: i32 = 9;
/// Number of pixels on the poke-hole strip.
pub const NEOPIXEL_COUNT: usize = 8;
/// BNC sync output for external acquisition systems.
pub const BNC_OUT_GPIO: i32 = 10;
/// Green status LED, blinked after each logged record.
pub const GREEN_LED_GPIO: i32 = 11;

// ---------------------------------------------------------------------------
// Battery sense (ADC1, behind a 1:2 divider)
// ---------------------------------------------------------------------------

/// ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const BATTERY_ADC_GPIO: i32 = 1;
pub const BATTERY_ADC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// SPI bus shared by the SD card and the memory LCD
// ---------------------------------------------------------------------------

pub const SPI_SCK_GPIO: i32 = 36;
pub const SPI_MOSI_GPIO: i32 = 35;
pub const SPI_MISO_GPIO: i32 = 37;
/// SD card chip select.
pub const SD_CS_GPIO: i32 = 38;
/// Sharp memory LCD chip select (active HIGH).
pub const DISPLAY_CS_GPIO: i32 = 39;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC duty resolution used for the buzzer square wave.
pub const BUZZER_PWM_RESOLUTION_BITS: u32 = 10;
