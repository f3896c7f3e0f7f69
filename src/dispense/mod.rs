//! Function-pointer state machine for delivering one pellet.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐    │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │    │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤    │
//! │  │ Stepping   │ fn(..)    │ -        │ fn(..)->Option<>  │    │
//! │  │ MinorJam   │ fn(..)    │ -        │ fn(..)->Option<>  │    │
//! │  │ VibrateJam │ fn(..)    │ -        │ fn(..)->Option<>  │    │
//! │  │ FullClear  │ fn(..)    │ -        │ fn(..)->Option<>  │    │
//! │  │ Delivered  │ fn(..)    │ -        │ terminal          │    │
//! │  │ Faulted    │ fn(..)    │ -        │ terminal          │    │
//! │  └────────────┴───────────┴──────────┴───────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  If it
//! returns `Some(next_id)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  [`DispenseController::feed`] ticks until a
//! terminal state is reached; the burst and duration ceilings guarantee
//! that happens.  A dispense in progress is never cancelled.

pub mod context;
pub mod states;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, FeederHardware};
use crate::config::FeederConfig;
use crate::error::DispenseFault;

use context::{DispenseAttempt, DispenseContext};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Stepping = 0,
    MinorJam = 1,
    VibrateJam = 2,
    FullClear = 3,
    Delivered = 4,
    Faulted = 5,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to `StateId`.  Out-of-range indices map to
    /// `Faulted`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Stepping,
            1 => Self::MinorJam,
            2 => Self::VibrateJam,
            3 => Self::FullClear,
            4 => Self::Delivered,
            5 => Self::Faulted,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Faulted
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Faulted)
    }
}

// ---------------------------------------------------------------------------
// Jam-recovery strategies
// ---------------------------------------------------------------------------

/// Escalating recovery motions, chosen from the burst counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum JamStrategy {
    /// Small forward nudge, no settle.
    MinorNudge,
    /// Settle, then oscillate back and forth.
    Vibrate,
    /// Settle, then randomized sweeps in both directions; resets the counter.
    FullClear,
}

impl JamStrategy {
    /// Strategy due after `bursts` consecutive empty bursts, if any.
    pub fn for_burst(bursts: u32) -> Option<Self> {
        match bursts {
            5 | 15 | 25 => Some(Self::MinorNudge),
            10 | 30 => Some(Self::Vibrate),
            20 | 40 => Some(Self::FullClear),
            _ => None,
        }
    }

    pub fn state(self) -> StateId {
        match self {
            Self::MinorNudge => StateId::MinorJam,
            Self::Vibrate => StateId::VibrateJam,
            Self::FullClear => StateId::FullClear,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn<H, S> = fn(&mut DispenseContext, &mut H, &mut S);

/// Per-tick handler.  Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn<H, S> = fn(&mut DispenseContext, &mut H, &mut S) -> Option<StateId>;

/// Static descriptor for a single state.  Stored in a fixed-size array,
/// no heap, no `dyn`.
pub struct StateDescriptor<H, S> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<H, S>>,
    pub on_exit: Option<StateActionFn<H, S>>,
    pub on_update: StateUpdateFn<H, S>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Table-driven engine.  Owns the state table and the current pointer; the
/// context and ports are threaded through every handler call.
pub struct Fsm<H, S> {
    table: [StateDescriptor<H, S>; StateId::COUNT],
    current: usize,
    tick_count: u32,
}

impl<H, S> Fsm<H, S> {
    pub fn new(table: [StateDescriptor<H, S>; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut DispenseContext, hw: &mut H, sink: &mut S) {
        debug!("dispense FSM starting in {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx, hw, sink);
        }
    }

    /// Run `on_update` for the current state and follow any transition.
    pub fn tick(&mut self, ctx: &mut DispenseContext, hw: &mut H, sink: &mut S) {
        self.tick_count += 1;
        if let Some(next) = (self.table[self.current].on_update)(ctx, hw, sink) {
            self.transition(next, ctx, hw, sink);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    fn transition(&mut self, next: StateId, ctx: &mut DispenseContext, hw: &mut H, sink: &mut S) {
        let next_idx = next as usize;
        debug!(
            "dispense FSM: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx, hw, sink);
        }
        self.current = next_idx;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx, hw, sink);
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Outcome of a successful dispense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseReport {
    pub bursts: u32,
    pub jam_clears: u32,
    pub elapsed_ms: u64,
    /// `(total burst, strategy)` for every recovery that ran, in order.
    pub escalations: heapless::Vec<(u32, JamStrategy), 32>,
}

/// Delivers one pellet per [`feed`](Self::feed) call.
pub struct DispenseController {
    ctx: DispenseContext,
}

impl DispenseController {
    /// `seed` drives the randomized full-clear sweep lengths.
    pub fn new(config: FeederConfig, seed: u64) -> Self {
        Self {
            ctx: DispenseContext::new(config, SmallRng::seed_from_u64(seed)),
        }
    }

    /// Run the motor until a pellet is in the well or a ceiling is hit.
    ///
    /// The motor is de-energised on return either way.
    pub fn feed<H: FeederHardware, S: EventSink>(
        &mut self,
        hw: &mut H,
        sink: &mut S,
    ) -> Result<DispenseReport, DispenseFault> {
        let mut fsm = Fsm::new(states::build_state_table::<H, S>(), StateId::Stepping);
        self.ctx.begin(hw.uptime_ms());
        sink.emit(&AppEvent::Dispensing);

        fsm.start(&mut self.ctx, hw, sink);
        while !fsm.current_state().is_terminal() {
            fsm.tick(&mut self.ctx, hw, sink);
        }
        hw.release_motor();

        let attempt = &self.ctx.attempt;
        let elapsed_ms = hw.uptime_ms().saturating_sub(attempt.started_ms);
        match (fsm.current_state(), self.ctx.fault) {
            (StateId::Faulted, Some(fault)) => Err(fault),
            (StateId::Faulted, None) => Err(DispenseFault::ExceededAttempts {
                bursts: attempt.total_bursts,
            }),
            _ => {
                info!(
                    "dispense: delivered after {} bursts, {} jam clears, {} ms",
                    attempt.total_bursts, attempt.jam_clears, elapsed_ms
                );
                Ok(DispenseReport {
                    bursts: attempt.total_bursts,
                    jam_clears: attempt.jam_clears,
                    elapsed_ms,
                    escalations: attempt.escalations.clone(),
                })
            }
        }
    }

    /// Bookkeeping for the most recent feed, delivered or not.
    pub fn last_attempt(&self) -> &DispenseAttempt {
        &self.ctx.attempt
    }

    pub fn config(&self) -> &FeederConfig {
        &self.ctx.config
    }
}
