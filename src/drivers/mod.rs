//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod buzzer;
pub mod hw_init;
pub mod memory_lcd;
pub mod pixels;
pub mod signal_out;
pub mod stepper;
pub mod watchdog;
