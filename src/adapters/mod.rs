//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                 | Connects to                 |
//! |-------------|----------------------------|-----------------------------|
//! | `hardware`  | SensorPort, MotorPort      | beam GPIOs, battery ADC     |
//! |             | StimulusPort, ClockPort    | stepper, NeoPixels, buzzer  |
//! | `display`   | EventSink                  | Sharp memory LCD            |
//! | `log_sink`  | EventSink                  | Serial log output           |
//! | `nvs`       | ConfigPort                 | NVS / in-memory store       |
//! | `sd_card`   | LogStore, SettingsStore    | FAT volume on the SD card   |
//! | `time`      | ClockPort                  | ESP32 RTC and system timer  |

pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod sd_card;
pub mod time;
