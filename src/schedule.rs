//! Reinforcement schedules.
//!
//! Pure decision logic: given the session mode, the active side's lifetime
//! poke count, the hour of day and the current progressive-ratio threshold,
//! decide whether a response has earned a reward.  No I/O, no clocks; the
//! caller supplies everything.
//!
//! | Mode                        | Gate condition              | Active | Reward    |
//! |-----------------------------|-----------------------------|--------|-----------|
//! | FreeFeeding                 | always                      | Left   | pellet    |
//! | FixedRatio(n)               | count > 0, count % n == 0   | Left   | pellet    |
//! | ProgressiveRatio            | count >= threshold          | Left   | pellet    |
//! | Extinction                  | FR1                         | Left   | withheld  |
//! | LightTracking               | FR1                         | cued   | pellet    |
//! | FixedRatioReversed          | FR1                         | Right  | pellet    |
//! | ProgressiveRatioReversed    | count >= threshold          | Right  | pellet    |
//! | SelfStimulation             | FR1                         | Left   | stimulus  |
//! | SelfStimulationReversed     | FR1                         | Right  | stimulus  |
//! | TimedFeeding(start, end)    | start <= hour < end         | Left   | pellet    |

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two nose-poke ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn label(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleMode
// ---------------------------------------------------------------------------

/// The reinforcement policy for a session.  Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleMode {
    FreeFeeding,
    FixedRatio(u16),
    ProgressiveRatio,
    Extinction,
    LightTracking,
    FixedRatioReversed,
    ProgressiveRatioReversed,
    SelfStimulation,
    SelfStimulationReversed,
    TimedFeeding { start_hour: u8, end_hour: u8 },
}

/// What a satisfied gate turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardAction {
    /// Drop a pellet.
    Dispense,
    /// Fire the stimulus output instead of feeding.
    Stimulate,
    /// Extinction: the response is recorded but never reinforced.
    Withhold,
}

impl ScheduleMode {
    /// Number of modes selectable from the setup menu.
    pub const MENU_COUNT: u8 = 12;

    /// Map a legacy `FEDmode.csv` index (0–11) to a mode.  FR sizes 1, 3
    /// and 5 occupy indices 1–3; index 11 takes the timed window.
    pub fn from_index(index: u8, start_hour: u8, end_hour: u8) -> Option<Self> {
        Some(match index {
            0 => Self::FreeFeeding,
            1 => Self::FixedRatio(1),
            2 => Self::FixedRatio(3),
            3 => Self::FixedRatio(5),
            4 => Self::ProgressiveRatio,
            5 => Self::Extinction,
            6 => Self::LightTracking,
            7 => Self::FixedRatioReversed,
            8 => Self::ProgressiveRatioReversed,
            9 => Self::SelfStimulation,
            10 => Self::SelfStimulationReversed,
            11 => Self::TimedFeeding { start_hour, end_hour },
            _ => return None,
        })
    }

    /// Inverse of [`from_index`](Self::from_index).  Fixed ratios other than
    /// 1/3/5 share index 2 and carry their size in a separate setting.
    pub fn to_index(self) -> u8 {
        match self {
            Self::FreeFeeding => 0,
            Self::FixedRatio(1) => 1,
            Self::FixedRatio(5) => 3,
            Self::FixedRatio(_) => 2,
            Self::ProgressiveRatio => 4,
            Self::Extinction => 5,
            Self::LightTracking => 6,
            Self::FixedRatioReversed => 7,
            Self::ProgressiveRatioReversed => 8,
            Self::SelfStimulation => 9,
            Self::SelfStimulationReversed => 10,
            Self::TimedFeeding { .. } => 11,
        }
    }

    /// Side whose pokes count toward the gate at session start.
    pub fn initial_active_side(self) -> Side {
        match self {
            Self::FixedRatioReversed
            | Self::ProgressiveRatioReversed
            | Self::SelfStimulationReversed => Side::Right,
            _ => Side::Left,
        }
    }

    pub fn reward_action(self) -> RewardAction {
        match self {
            Self::Extinction => RewardAction::Withhold,
            Self::SelfStimulation | Self::SelfStimulationReversed => RewardAction::Stimulate,
            _ => RewardAction::Dispense,
        }
    }

    /// Modes whose gate opens without any poke.
    pub fn is_unconditional(self) -> bool {
        matches!(self, Self::FreeFeeding | Self::TimedFeeding { .. })
    }

    /// Fixed-ratio size the mode gates on, if it is ratio based.
    pub fn ratio(self) -> Option<u16> {
        match self {
            Self::FixedRatio(n) => Some(n),
            Self::Extinction
            | Self::LightTracking
            | Self::FixedRatioReversed
            | Self::SelfStimulation
            | Self::SelfStimulationReversed => Some(1),
            _ => None,
        }
    }

    /// `Session_Type` column value.  Progressive modes report the increment
    /// that the next delivery will add.
    pub fn session_label(self, pellet_count: u32) -> heapless::String<24> {
        let mut s = heapless::String::new();
        // Capacity covers the longest label ("PR_reversed" + digits).
        let written = match self {
            Self::FreeFeeding => fmt::write(&mut s, format_args!("FED")),
            Self::FixedRatio(n) => fmt::write(&mut s, format_args!("FR{n}")),
            Self::ProgressiveRatio => fmt::write(
                &mut s,
                format_args!("PR{}", progressive_increment(pellet_count)),
            ),
            Self::ProgressiveRatioReversed => fmt::write(
                &mut s,
                format_args!("PR_reversed{}", progressive_increment(pellet_count)),
            ),
            Self::Extinction => fmt::write(&mut s, format_args!("Extinction")),
            Self::LightTracking => fmt::write(&mut s, format_args!("FR1_Light_tracking")),
            Self::FixedRatioReversed => fmt::write(&mut s, format_args!("FR1_reversed")),
            Self::SelfStimulation => fmt::write(&mut s, format_args!("Self_stim")),
            Self::SelfStimulationReversed => {
                fmt::write(&mut s, format_args!("Self_stim_reversed"))
            }
            Self::TimedFeeding { start_hour, end_hour } => {
                fmt::write(&mut s, format_args!("Timed_{start_hour}to{end_hour}"))
            }
        };
        debug_assert!(written.is_ok(), "session label truncated: {s}");
        s
    }

    /// Short name for the status screen.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::FreeFeeding => "Free feeding",
            Self::FixedRatio(_) => "Fixed ratio",
            Self::ProgressiveRatio => "Progressive Ratio",
            Self::Extinction => "Extinction",
            Self::LightTracking => "Light tracking",
            Self::FixedRatioReversed => "FR1 (reversed)",
            Self::ProgressiveRatioReversed => "PR (reversed)",
            Self::SelfStimulation => "Self-Stimulation",
            Self::SelfStimulationReversed => "Stim (reversed)",
            Self::TimedFeeding { .. } => "Timed feeding",
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.session_label(0))
    }
}

// ---------------------------------------------------------------------------
// Evaluation, one function per policy
// ---------------------------------------------------------------------------

/// Inputs to one gate evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    /// Lifetime poke count on the active side.
    pub active_count: u32,
    /// Current hour of day (0–23).
    pub hour: u8,
    /// Progressive-ratio threshold.
    pub threshold: u32,
}

/// Whether `mode` grants a reward for `input`.
pub fn evaluate(mode: ScheduleMode, input: GateInput) -> bool {
    match mode {
        ScheduleMode::FreeFeeding => free_feeding(),
        ScheduleMode::TimedFeeding { start_hour, end_hour } => {
            timed_feeding(input.hour, start_hour, end_hour)
        }
        ScheduleMode::FixedRatio(n) => fixed_ratio(input.active_count, n),
        ScheduleMode::ProgressiveRatio | ScheduleMode::ProgressiveRatioReversed => {
            progressive_ratio(input.active_count, input.threshold)
        }
        ScheduleMode::Extinction
        | ScheduleMode::LightTracking
        | ScheduleMode::FixedRatioReversed
        | ScheduleMode::SelfStimulation
        | ScheduleMode::SelfStimulationReversed => fixed_ratio(input.active_count, 1),
    }
}

fn free_feeding() -> bool {
    true
}

fn timed_feeding(hour: u8, start_hour: u8, end_hour: u8) -> bool {
    hour >= start_hour && hour < end_hour
}

pub fn fixed_ratio(count: u32, n: u16) -> bool {
    let n = u32::from(n.max(1));
    count > 0 && count % n == 0
}

fn progressive_ratio(count: u32, threshold: u32) -> bool {
    count >= threshold
}

/// Richardson & Roberts (1996) progressive-ratio step after the `k`-th
/// pellet: `round(5·e^(0.2·k) − 5)`.
pub fn progressive_increment(k: u32) -> u32 {
    let raw = 5.0_f64 * (0.2 * f64::from(k)).exp() - 5.0;
    raw.round().max(0.0) as u32
}

// ---------------------------------------------------------------------------
// RewardGate
// ---------------------------------------------------------------------------

/// The "ratio met" latch plus the response requirement it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGate {
    /// A reward is owed and the well is empty.
    pub ratio_met: bool,
    /// Active-side count needed for the next progressive-ratio reward.
    pub threshold: u32,
    /// Side whose pokes count toward the gate.
    pub active_side: Side,
}

impl RewardGate {
    pub fn new(mode: ScheduleMode) -> Self {
        Self {
            ratio_met: false,
            threshold: 1,
            active_side: mode.initial_active_side(),
        }
    }

    /// Open the gate if `mode` grants a reward.  Never closes it.
    pub fn check(&mut self, mode: ScheduleMode, input: GateInput) -> bool {
        if evaluate(mode, input) {
            self.ratio_met = true;
        }
        self.ratio_met
    }

    /// A pellet became available: close the gate and move the progressive
    /// threshold on by the increment for the new pellet count.
    pub fn advance(&mut self, pellet_count: u32) {
        self.ratio_met = false;
        self.threshold = self
            .threshold
            .saturating_add(progressive_increment(pellet_count));
    }

    /// Close the gate without a delivery (stimulus or extinction trials).
    pub fn clear(&mut self) {
        self.ratio_met = false;
    }
}
