//! FED3 pellet feeder firmware library.
//!
//! Exposes the control core (schedules, dispense FSM, session recorder,
//! setup menu) and the adapters behind it for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; host builds get simulated pins instead.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dispense;
pub mod events;
pub mod menu;
pub mod power;
pub mod recorder;
pub mod schedule;

pub mod error;
pub mod pins;

pub mod adapters;
pub mod drivers;
pub mod sensors;
