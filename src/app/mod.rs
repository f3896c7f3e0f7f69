//! Application core: pure domain logic, zero I/O.
//!
//! The control loop ([`service`]), the device-state aggregate ([`state`]),
//! and the stimulus sequences it plays.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
pub mod state;
pub mod stimuli;
