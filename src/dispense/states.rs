//! Concrete state handler functions and table builder.
//!
//! ```text
//!            ┌──────────[pellet seen]─────────────▶ DELIVERED
//!            │
//!  STEPPING ─┼──[burst 5/15/25]──▶ MINOR_JAM ───┐
//!     ▲      ├──[burst 10/30]────▶ VIBRATE_JAM ─┤
//!     │      ├──[burst 20/40]────▶ FULL_CLEAR ──┤ (counter := 0)
//!     └──────┼──────────────────────────────────┘
//!            └──[ceiling hit]──────────────────────▶ FAULTED
//! ```
//!
//! The well is read before every motor move, so a pellet that lands
//! mid-burst stops the motor on the next step call.

use log::{info, trace, warn};
use rand::Rng;

use super::context::DispenseContext;
use super::{JamStrategy, StateDescriptor, StateId};
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, FeederHardware};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table for a concrete hardware/sink pair.
pub fn build_state_table<H: FeederHardware, S: EventSink>() -> [StateDescriptor<H, S>; StateId::COUNT]
{
    [
        // Index 0: Stepping
        StateDescriptor {
            id: StateId::Stepping,
            name: "Stepping",
            on_enter: Some(stepping_enter::<H, S>),
            on_exit: None,
            on_update: stepping_update::<H, S>,
        },
        // Index 1: MinorJam
        StateDescriptor {
            id: StateId::MinorJam,
            name: "MinorJam",
            on_enter: Some(minor_jam_enter::<H, S>),
            on_exit: None,
            on_update: minor_jam_update::<H, S>,
        },
        // Index 2: VibrateJam
        StateDescriptor {
            id: StateId::VibrateJam,
            name: "VibrateJam",
            on_enter: Some(vibrate_jam_enter::<H, S>),
            on_exit: None,
            on_update: vibrate_jam_update::<H, S>,
        },
        // Index 3: FullClear
        StateDescriptor {
            id: StateId::FullClear,
            name: "FullClear",
            on_enter: Some(full_clear_enter::<H, S>),
            on_exit: None,
            on_update: full_clear_update::<H, S>,
        },
        // Index 4: Delivered
        StateDescriptor {
            id: StateId::Delivered,
            name: "Delivered",
            on_enter: Some(delivered_enter::<H, S>),
            on_exit: None,
            on_update: terminal_update::<H, S>,
        },
        // Index 5: Faulted
        StateDescriptor {
            id: StateId::Faulted,
            name: "Faulted",
            on_enter: Some(faulted_enter::<H, S>),
            on_exit: None,
            on_update: terminal_update::<H, S>,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Motion helpers
// ═══════════════════════════════════════════════════════════════════════════

fn step_counted<H: FeederHardware>(ctx: &mut DispenseContext, hw: &mut H, steps: i32) {
    hw.step(steps);
    ctx.attempt.steps_issued += u64::from(steps.unsigned_abs());
}

/// Well still empty after the settle delay.
fn settled_empty<H: FeederHardware>(ctx: &DispenseContext, hw: &mut H) -> bool {
    if hw.pellet_present() {
        return false;
    }
    hw.delay_ms(ctx.config.jam_settle_ms);
    !hw.pellet_present()
}

// ═══════════════════════════════════════════════════════════════════════════
//  STEPPING: bounded bursts, poll after each
// ═══════════════════════════════════════════════════════════════════════════

fn stepping_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    _hw: &mut H,
    _sink: &mut S,
) {
    trace!("STEPPING: from burst {}", ctx.attempt.total_bursts);
}

fn stepping_update<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) -> Option<StateId> {
    if hw.pellet_present() {
        return Some(StateId::Delivered);
    }

    // One burst; each call is skipped once the pellet is seen.
    hw.enable_motor();
    for _ in 0..ctx.config.burst_step_calls {
        if hw.pellet_present() {
            break;
        }
        step_counted(ctx, hw, ctx.config.burst_steps);
    }
    hw.release_motor();

    // Give the pellet time to drop past the beam.
    for _ in 0..ctx.config.dispense_poll_count {
        if hw.pellet_present() {
            break;
        }
        hw.delay_ms(ctx.config.dispense_poll_ms);
    }

    ctx.attempt.bursts += 1;
    ctx.attempt.total_bursts += 1;

    if hw.pellet_present() {
        return Some(StateId::Delivered);
    }

    if let Some(fault) = ctx.check_ceiling(hw.uptime_ms()) {
        warn!("STEPPING: {}", fault);
        return Some(StateId::Faulted);
    }

    JamStrategy::for_burst(ctx.attempt.bursts).map(JamStrategy::state)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MINOR_JAM: single forward nudge
// ═══════════════════════════════════════════════════════════════════════════

fn minor_jam_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    _hw: &mut H,
    sink: &mut S,
) {
    announce(ctx, sink, JamStrategy::MinorNudge);
}

fn minor_jam_update<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) -> Option<StateId> {
    hw.enable_motor();
    step_counted(ctx, hw, ctx.config.minor_jam_steps);
    hw.release_motor();
    Some(StateId::Stepping)
}

// ═══════════════════════════════════════════════════════════════════════════
//  VIBRATE_JAM: settle, then oscillate
// ═══════════════════════════════════════════════════════════════════════════

fn vibrate_jam_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    _hw: &mut H,
    sink: &mut S,
) {
    ctx.attempt.jam_clears += 1;
    announce(ctx, sink, JamStrategy::Vibrate);
}

fn vibrate_jam_update<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) -> Option<StateId> {
    if settled_empty(ctx, hw) {
        hw.enable_motor();
        for _ in 0..ctx.config.vibrate_cycles {
            if hw.pellet_present() {
                continue;
            }
            step_counted(ctx, hw, ctx.config.vibrate_forward_steps);
            if !hw.pellet_present() {
                step_counted(ctx, hw, -ctx.config.vibrate_back_steps);
            }
        }
        hw.release_motor();
    }
    Some(StateId::Stepping)
}

// ═══════════════════════════════════════════════════════════════════════════
//  FULL_CLEAR: randomized sweeps in both directions
// ═══════════════════════════════════════════════════════════════════════════

fn full_clear_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    _hw: &mut H,
    sink: &mut S,
) {
    ctx.attempt.jam_clears += 1;
    announce(ctx, sink, JamStrategy::FullClear);
}

fn full_clear_update<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) -> Option<StateId> {
    // Dispensing direction first, then back.
    for direction in [-1_i32, 1] {
        if !settled_empty(ctx, hw) {
            continue;
        }
        let extra = match ctx.config.full_clear_extra_cycles {
            0 => 0,
            n => ctx.rng.gen_range(0..n),
        };
        let cycles = i32::from(ctx.config.full_clear_min_cycles) + i32::from(extra);
        trace!("FULL_CLEAR: {} cycles, direction {}", cycles, direction);

        hw.enable_motor();
        for i in 0..cycles {
            if !hw.pellet_present() {
                step_counted(ctx, hw, direction * i * ctx.config.full_clear_step_scale);
            }
        }
        hw.release_motor();
    }
    ctx.attempt.bursts = 0;
    Some(StateId::Stepping)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Terminal states
// ═══════════════════════════════════════════════════════════════════════════

fn delivered_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) {
    hw.release_motor();
    trace!(
        "DELIVERED: {} steps issued",
        ctx.attempt.steps_issued
    );
}

fn faulted_enter<H: FeederHardware, S: EventSink>(
    ctx: &mut DispenseContext,
    hw: &mut H,
    _sink: &mut S,
) {
    hw.release_motor();
    warn!(
        "FAULTED: well still empty after {} bursts and {} jam clears",
        ctx.attempt.total_bursts, ctx.attempt.jam_clears
    );
}

fn terminal_update<H: FeederHardware, S: EventSink>(
    _ctx: &mut DispenseContext,
    _hw: &mut H,
    _sink: &mut S,
) -> Option<StateId> {
    None
}

fn announce<S: EventSink>(ctx: &mut DispenseContext, sink: &mut S, strategy: JamStrategy) {
    ctx.record_escalation(strategy);
    info!(
        "jam recovery: {:?} after burst {}",
        strategy, ctx.attempt.total_bursts
    );
    sink.emit(&AppEvent::JamRecovery {
        strategy,
        burst: ctx.attempt.total_bursts,
    });
}

#[cfg(test)]
mod tests {
    use super::super::{DispenseController, JamStrategy};
    use crate::app::events::AppEvent;
    use crate::app::ports::{ClockPort, EventSink, MotorPort, Rgbw, SensorPort, StimulusPort};
    use crate::config::FeederConfig;
    use crate::error::DispenseFault;
    use crate::schedule::Side;
    use chrono::NaiveDateTime;
    use embedded_hal::delay::DelayNs;

    /// Well turns present once `bursts_until_present` full bursts have run.
    pub(super) struct Feeder {
        bursts_until_present: Option<u32>,
        burst_steps: u32,
        now_ns: u64,
        motor_on: bool,
        moves_while_disabled: u32,
    }

    impl Feeder {
        pub(super) fn new(bursts_until_present: Option<u32>) -> Self {
            Self {
                bursts_until_present,
                burst_steps: 0,
                now_ns: 0,
                motor_on: false,
                moves_while_disabled: 0,
            }
        }
    }

    impl SensorPort for Feeder {
        fn pellet_present(&mut self) -> bool {
            self.bursts_until_present
                .is_some_and(|n| self.burst_steps > n * 9)
        }
        fn poke_pressed(&mut self, _side: Side) -> bool {
            false
        }
        fn battery_volts(&mut self) -> f32 {
            4.0
        }
    }

    impl MotorPort for Feeder {
        fn enable_motor(&mut self) {
            self.motor_on = true;
        }
        fn step(&mut self, steps: i32) {
            if !self.motor_on {
                self.moves_while_disabled += 1;
            }
            if steps == -30 {
                self.burst_steps += 1;
            }
        }
        fn release_motor(&mut self) {
            self.motor_on = false;
        }
    }

    impl StimulusPort for Feeder {
        fn tone(&mut self, _freq_hz: u32, _duration_ms: u32) {}
        fn set_pixel(&mut self, _index: usize, _colour: Rgbw) {}
        fn show_pixels(&mut self) {}
        fn sync_pulse(&mut self, _duration_ms: u32) {}
        fn blink_status(&mut self, _times: u8) {}
    }

    impl ClockPort for Feeder {
        fn now(&self) -> NaiveDateTime {
            NaiveDateTime::default()
        }
        fn uptime_ms(&self) -> u64 {
            self.now_ns / 1_000_000
        }
    }

    impl DelayNs for Feeder {
        fn delay_ns(&mut self, ns: u32) {
            self.now_ns += u64::from(ns);
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn present_before_start_delivers_without_moving() {
        let mut hw = Feeder::new(Some(0));
        hw.burst_steps = 1;
        let mut ctl = DispenseController::new(FeederConfig::default(), 1);
        let report = ctl.feed(&mut hw, &mut Events::default()).unwrap();
        assert_eq!(report.bursts, 0);
        assert_eq!(ctl.last_attempt().steps_issued, 0);
    }

    #[test]
    fn first_burst_delivers() {
        let mut hw = Feeder::new(Some(0));
        let mut ctl = DispenseController::new(FeederConfig::default(), 1);
        let report = ctl.feed(&mut hw, &mut Events::default()).unwrap();
        assert_eq!(report.bursts, 1);
        assert!(report.escalations.is_empty());
        assert!(!hw.motor_on);
    }

    #[test]
    fn never_moves_with_driver_disabled() {
        let mut hw = Feeder::new(Some(33));
        let mut ctl = DispenseController::new(FeederConfig::default(), 3);
        ctl.feed(&mut hw, &mut Events::default()).unwrap();
        assert_eq!(hw.moves_while_disabled, 0);
        assert!(!hw.motor_on);
    }

    #[test]
    fn jammed_forever_hits_burst_ceiling() {
        let mut hw = Feeder::new(None);
        let mut ctl = DispenseController::new(FeederConfig::default(), 9);
        let mut events = Events::default();
        let err = ctl.feed(&mut hw, &mut events).unwrap_err();
        assert_eq!(err, DispenseFault::ExceededAttempts { bursts: 80 });
        assert!(!hw.motor_on);
        assert!(events.0.iter().any(|e| matches!(
            e,
            AppEvent::JamRecovery { strategy: JamStrategy::FullClear, .. }
        )));
    }

    #[test]
    fn duration_ceiling_trips_first_when_tighter() {
        let config = FeederConfig {
            max_dispense_secs: 10,
            ..FeederConfig::default()
        };
        let mut hw = Feeder::new(None);
        let mut ctl = DispenseController::new(config, 9);
        let err = ctl.feed(&mut hw, &mut Events::default()).unwrap_err();
        assert!(matches!(err, DispenseFault::ExceededDuration { .. }));
    }

    #[test]
    fn full_clear_resets_escalation_counter() {
        let mut hw = Feeder::new(Some(26));
        let mut ctl = DispenseController::new(FeederConfig::default(), 5);
        let report = ctl.feed(&mut hw, &mut Events::default()).unwrap();
        let strategies: Vec<(u32, JamStrategy)> = report.escalations.iter().copied().collect();
        assert_eq!(
            strategies,
            vec![
                (5, JamStrategy::MinorNudge),
                (10, JamStrategy::Vibrate),
                (15, JamStrategy::MinorNudge),
                (20, JamStrategy::FullClear),
                (25, JamStrategy::MinorNudge),
            ]
        );
        assert_eq!(report.jam_clears, 2);
    }
}
