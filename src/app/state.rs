//! The single owned device-state aggregate.
//!
//! Interrupt handlers never touch this; they only latch flags in
//! [`crate::events`].  The control loop is the sole writer.

use serde::{Deserialize, Serialize};

use crate::error::DispenseFault;
use crate::schedule::{RewardGate, ScheduleMode, Side};

/// Highest device number selectable from the setup menu.
pub const MAX_DEVICE_NUMBER: u16 = 700;

// ---------------------------------------------------------------------------
// Identity (loaded once at boot, immutable for the session)
// ---------------------------------------------------------------------------

/// Timed-feeding window `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Default for TimedWindow {
    fn default() -> Self {
        Self {
            start_hour: 18,
            end_hour: 21,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// 0–700.
    pub device_number: u16,
    pub mode: ScheduleMode,
    /// Kept even outside timed sessions so the menu can edit it.
    pub window: TimedWindow,
}

impl DeviceIdentity {
    pub fn new(device_number: u16, mode: ScheduleMode, window: TimedWindow) -> Self {
        let mode = match mode {
            ScheduleMode::TimedFeeding { .. } => ScheduleMode::TimedFeeding {
                start_hour: window.start_hour,
                end_hour: window.end_hour,
            },
            other => other,
        };
        Self {
            device_number: device_number.min(MAX_DEVICE_NUMBER),
            mode,
            window,
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(0, ScheduleMode::FreeFeeding, TimedWindow::default())
    }
}

// ---------------------------------------------------------------------------
// Mutable session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PokeState {
    /// Beam broken at the last sample, or a flagged press not yet seen released.
    pub pressed: bool,
    /// Lifetime count, monotone within a session.
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PelletWellState {
    pub present: bool,
    /// Lifetime pellets delivered, monotone within a session.
    pub pellet_count: u32,
    /// Uptime at which the pellet now in the well landed; `None` once it
    /// has been logged as retrieved.
    pub dispensed_at_ms: Option<u64>,
}

/// Motor activity since the last log record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MotorTally {
    pub bursts: u32,
    pub jam_clears: u32,
}

impl MotorTally {
    /// `Motor_Turns` column value; resets the tally.
    pub fn take(&mut self) -> u32 {
        let turns = self.jam_clears * 10 + self.bursts;
        *self = Self::default();
        turns
    }
}

#[derive(Debug, Clone)]
pub struct DeviceState {
    pub identity: DeviceIdentity,
    pub left: PokeState,
    pub right: PokeState,
    pub well: PelletWellState,
    pub gate: RewardGate,
    pub motor: MotorTally,
    /// Last dispense that hit the ceiling; cleared on the next delivery.
    pub dispense_fault: Option<DispenseFault>,
}

impl DeviceState {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            left: PokeState::default(),
            right: PokeState::default(),
            well: PelletWellState::default(),
            gate: RewardGate::new(identity.mode),
            motor: MotorTally::default(),
            dispense_fault: None,
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.identity.mode
    }

    pub fn poke(&self, side: Side) -> &PokeState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn poke_mut(&mut self, side: Side) -> &mut PokeState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Lifetime count on the side that currently drives the gate.
    pub fn active_count(&self) -> u32 {
        self.poke(self.gate.active_side).count
    }
}
