//! Outbound application events.
//!
//! The [`FeederService`](super::service::FeederService) and the dispense
//! controller emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: log to
//! serial, redraw the status screen, etc.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::app::ports::StorageError;
use crate::dispense::JamStrategy;
use crate::error::DispenseFault;
use crate::recorder::RetrievalInterval;
use crate::schedule::{RewardAction, ScheduleMode, Side};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The session has started.
    Started { device_number: u16, mode: ScheduleMode },

    /// A poke was counted.  `active` is true if it was on the gate's side.
    Poke { side: Side, count: u32, active: bool },

    /// The gate opened and the reward is about to be delivered.
    RewardEarned { side: Side, action: RewardAction },

    /// The motor started a dispense.
    Dispensing,

    /// A jam-recovery strategy ran after `burst` bursts.
    JamRecovery { strategy: JamStrategy, burst: u32 },

    /// A pellet reached the well.
    PelletDelivered { pellet_count: u32, bursts: u32 },

    /// The delivered pellet was taken (or its retrieval window elapsed).
    PelletRetrieved { interval: RetrievalInterval },

    /// A self-stimulation trial fired the stimulus output.
    StimulusDelivered { side: Side },

    /// A dispense hit its ceiling; the gate stays set for a retry.
    DispenseFault(DispenseFault),

    /// A log record could not be written.
    RecordFailed(StorageError),

    /// Both pokes were held long enough to request a reset.
    ResetRequested,

    /// End-of-cycle status for the presentation layer.
    Status(StatusSnapshot),
}

/// A point-in-time snapshot suitable for logging or rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub time: NaiveDateTime,
    pub device_number: u16,
    pub mode: ScheduleMode,
    pub left_count: u32,
    pub right_count: u32,
    pub pellet_count: u32,
    pub pellet_present: bool,
    pub active_side: Side,
    pub ratio_met: bool,
    /// Pokes still needed for the next progressive-ratio reward.
    pub pokes_remaining: Option<u32>,
    pub battery_volts: f32,
    pub faulted: bool,
}
