//! Application service: the control loop core.
//!
//! [`FeederService`] owns the [`DeviceState`] aggregate and the dispense
//! controller.  Each [`run_cycle`](FeederService::run_cycle) drains the
//! captured flags, re-reads the live pins, records what happened, and
//! delivers any reward that was earned.  All I/O flows through port traits
//! injected at call sites, so the whole cycle runs against mock hardware.
//!
//! ```text
//!  EventCapture ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  SensorPort   ──▶ │      FeederService       │ ──▶ SessionRecorder
//!  MotorPort    ◀── │ Schedule · Dispense FSM  │
//!                   └──────────────────────────┘
//! ```

use chrono::Timelike;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::FeederConfig;
use crate::dispense::DispenseController;
use crate::error::SensorError;
use crate::events::{CapturedEvents, EventCapture};
use crate::recorder::{EventKind, LogRecord, RetrievalInterval, SessionRecorder};
use crate::schedule::{GateInput, RewardAction, ScheduleMode, Side};

use super::events::{AppEvent, StatusSnapshot};
use super::ports::{EventSink, FeederHardware, LogStore};
use super::state::{DeviceIdentity, DeviceState};
use super::stimuli;

/// What one control cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Log rows written this cycle.
    pub records: u32,
    /// A pellet reached the well this cycle.
    pub dispensed: bool,
    /// Both pokes were held for the reset period; the caller should restart.
    pub reset_requested: bool,
}

// ───────────────────────────────────────────────────────────────
// FeederService
// ───────────────────────────────────────────────────────────────

pub struct FeederService {
    state: DeviceState,
    config: FeederConfig,
    dispenser: DispenseController,
    /// Light-tracking side draws and error-tone pitches.
    rng: SmallRng,
    cycles: u64,
}

impl FeederService {
    /// `seed` drives every random choice the service and dispenser make.
    pub fn new(identity: DeviceIdentity, config: FeederConfig, seed: u64) -> Self {
        Self {
            state: DeviceState::new(identity),
            dispenser: DispenseController::new(config.clone(), seed),
            config,
            rng: SmallRng::seed_from_u64(seed.rotate_left(32)),
            cycles: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Latch the initial pin levels and announce the session.
    pub fn start<H: FeederHardware, S: EventSink>(&mut self, hw: &mut H, sink: &mut S) {
        self.state.well.present = hw.pellet_present();
        for side in Side::BOTH {
            self.state.poke_mut(side).pressed = hw.poke_pressed(side);
        }
        if self.state.mode() == ScheduleMode::LightTracking {
            stimuli::tracking_cue(hw, self.state.gate.active_side);
        }

        let identity = self.state.identity;
        sink.emit(&AppEvent::Started {
            device_number: identity.device_number,
            mode: identity.mode,
        });
        info!(
            "FeederService started: device {} in {}",
            identity.device_number, identity.mode
        );
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one control cycle: drain flags → pellet well → pokes → reward →
    /// status.
    ///
    /// A poke counts once per beam break: its edge flag, or a live level
    /// the edge interrupt missed.  The pellet well is re-read live; an
    /// arrival while a reward is owed settles that reward.
    pub fn run_cycle<H, L, S>(
        &mut self,
        capture: &EventCapture,
        hw: &mut H,
        recorder: &mut SessionRecorder<L>,
        sink: &mut S,
    ) -> CycleOutcome
    where
        H: FeederHardware,
        L: LogStore,
        S: EventSink,
    {
        self.cycles += 1;
        let mut outcome = CycleOutcome::default();
        // Poke levels are sampled before the drain, so a press that lands
        // later in the cycle is seen only through its flag next cycle.
        let live_left = hw.poke_pressed(Side::Left);
        let live_right = hw.poke_pressed(Side::Right);
        let flags = capture.drain();
        let battery = hw.battery_volts();

        // 1. Pellet well
        self.update_well(&flags, hw, recorder, sink, battery, &mut outcome);

        // 2. Free and timed feeding owe a pellet whenever the well is empty
        if self.state.mode().is_unconditional() && !self.state.well.present {
            let input = self.gate_input(hw);
            self.state.gate.check(self.state.mode(), input);
        }

        // 3. Pokes
        for side in Side::BOTH {
            let live = match side {
                Side::Left => live_left,
                Side::Right => live_right,
            };
            let flagged = flags.poke(side);
            let poke = self.state.poke_mut(side);
            let edge = flagged || (live && !poke.pressed);
            // A flagged press still held at the next sample is the same press.
            poke.pressed = live || flagged;
            if !edge {
                continue;
            }
            poke.count += 1;
            let count = poke.count;

            let active = side == self.state.gate.active_side;
            self.write_record(
                EventKind::Poke,
                RetrievalInterval::NotApplicable,
                hw,
                recorder,
                sink,
                battery,
                &mut outcome,
            );
            sink.emit(&AppEvent::Poke { side, count, active });

            if active && !self.state.well.present {
                let input = self.gate_input(hw);
                self.state.gate.check(self.state.mode(), input);
            }

            if self.reset_held(hw) {
                stimuli::reset_sequence(hw);
                sink.emit(&AppEvent::ResetRequested);
                warn!("reset requested from both pokes");
                outcome.reset_requested = true;
                return outcome;
            }
        }

        // 4. Reward
        if self.state.gate.ratio_met && !self.state.well.present {
            self.deliver_reward(hw, recorder, sink, battery, &mut outcome);
        }

        // 5. Status for the presentation layer
        sink.emit(&AppEvent::Status(self.build_status(hw, battery)));
        outcome
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    pub fn build_status<H: FeederHardware>(&self, hw: &H, battery_volts: f32) -> StatusSnapshot {
        let pokes_remaining = match self.state.mode() {
            ScheduleMode::ProgressiveRatio | ScheduleMode::ProgressiveRatioReversed => Some(
                self.state
                    .gate
                    .threshold
                    .saturating_sub(self.state.active_count()),
            ),
            _ => None,
        };
        StatusSnapshot {
            time: hw.now(),
            device_number: self.state.identity.device_number,
            mode: self.state.mode(),
            left_count: self.state.left.count,
            right_count: self.state.right.count,
            pellet_count: self.state.well.pellet_count,
            pellet_present: self.state.well.present,
            active_side: self.state.gate.active_side,
            ratio_met: self.state.gate.ratio_met,
            pokes_remaining,
            battery_volts,
            faulted: self.state.dispense_fault.is_some(),
        }
    }

    // ── Internal helpers ──────────────────────────────────────

    fn gate_input<H: FeederHardware>(&self, hw: &H) -> GateInput {
        GateInput {
            active_count: self.state.active_count(),
            hour: hw.now().hour() as u8,
            threshold: self.state.gate.threshold,
        }
    }

    fn update_well<H, L, S>(
        &mut self,
        flags: &CapturedEvents,
        hw: &mut H,
        recorder: &mut SessionRecorder<L>,
        sink: &mut S,
        battery: f32,
        outcome: &mut CycleOutcome,
    ) where
        H: FeederHardware,
        L: LogStore,
        S: EventSink,
    {
        let present = hw.pellet_present();
        let was_present = self.state.well.present;

        if (flags.pellet_removed && present && was_present)
            || (flags.pellet_arrived && !present && !was_present)
        {
            debug!("pellet well: {}", SensorError::StaleEdge);
        }

        self.state.well.present = present;
        if present && !was_present && self.state.gate.ratio_met {
            // A jam that cleared itself after a fault: this is the owed pellet.
            info!("owed pellet arrived without a dispense");
            self.record_delivery(0, hw, recorder, sink, battery, outcome);
            return;
        }
        if !was_present || present {
            return;
        }

        // Pellet taken.
        hw.sync_pulse(self.config.sync_pulse_ms);
        let interval = match self.state.well.dispensed_at_ms.take() {
            Some(at) => RetrievalInterval::classify(
                hw.uptime_ms().saturating_sub(at),
                self.config.retrieval_timeout_secs,
            ),
            None => RetrievalInterval::NotApplicable,
        };
        self.write_record(
            EventKind::Retrieval,
            interval,
            hw,
            recorder,
            sink,
            battery,
            outcome,
        );
        sink.emit(&AppEvent::PelletRetrieved { interval });
    }

    /// Both beams broken, and still broken after the hold period.
    fn reset_held<H: FeederHardware>(&mut self, hw: &mut H) -> bool {
        let both = |hw: &mut H| hw.poke_pressed(Side::Left) && hw.poke_pressed(Side::Right);
        if !both(hw) {
            return false;
        }
        hw.delay_ms(self.config.reset_hold_ms);
        both(hw)
    }

    fn deliver_reward<H, L, S>(
        &mut self,
        hw: &mut H,
        recorder: &mut SessionRecorder<L>,
        sink: &mut S,
        battery: f32,
        outcome: &mut CycleOutcome,
    ) where
        H: FeederHardware,
        L: LogStore,
        S: EventSink,
    {
        let side = self.state.gate.active_side;
        let action = self.state.mode().reward_action();
        sink.emit(&AppEvent::RewardEarned { side, action });

        match action {
            RewardAction::Withhold => {
                debug!("extinction: reward withheld");
                self.state.gate.clear();
            }
            RewardAction::Stimulate => {
                stimuli::conditioned_stimulus(hw, side);
                hw.sync_pulse(self.config.sync_pulse_ms);
                self.state.gate.clear();
                sink.emit(&AppEvent::StimulusDelivered { side });
            }
            RewardAction::Dispense => {
                stimuli::conditioned_stimulus(hw, side);
                let result = self.dispenser.feed(hw, sink);
                let attempt = self.dispenser.last_attempt();
                self.state.motor.bursts += attempt.total_bursts;
                self.state.motor.jam_clears += attempt.jam_clears;

                match result {
                    Ok(report) => {
                        self.record_delivery(report.bursts, hw, recorder, sink, battery, outcome);
                    }
                    Err(fault) => {
                        warn!("dispense aborted: {}", fault);
                        self.state.dispense_fault = Some(fault);
                        self.write_record(
                            EventKind::HardwareFault,
                            RetrievalInterval::NotApplicable,
                            hw,
                            recorder,
                            sink,
                            battery,
                            outcome,
                        );
                        stimuli::error_stimulus(hw, &mut self.rng);
                        sink.emit(&AppEvent::DispenseFault(fault));
                    }
                }
            }
        }
    }

    /// Count the pellet now in the well and close the gate behind it.
    fn record_delivery<H, L, S>(
        &mut self,
        bursts: u32,
        hw: &mut H,
        recorder: &mut SessionRecorder<L>,
        sink: &mut S,
        battery: f32,
        outcome: &mut CycleOutcome,
    ) where
        H: FeederHardware,
        L: LogStore,
        S: EventSink,
    {
        let well = &mut self.state.well;
        well.present = true;
        well.pellet_count += 1;
        well.dispensed_at_ms = Some(hw.uptime_ms());
        let pellet_count = well.pellet_count;
        self.state.gate.advance(pellet_count);
        self.state.dispense_fault = None;
        outcome.dispensed = true;

        sink.emit(&AppEvent::PelletDelivered { pellet_count, bursts });
        self.write_record(
            EventKind::Pellet,
            RetrievalInterval::NotApplicable,
            hw,
            recorder,
            sink,
            battery,
            outcome,
        );

        if self.state.mode() == ScheduleMode::LightTracking {
            let next = if self.rng.gen_bool(0.5) { Side::Left } else { Side::Right };
            self.state.gate.active_side = next;
            stimuli::tracking_cue(hw, next);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_record<H, L, S>(
        &mut self,
        kind: EventKind,
        retrieval: RetrievalInterval,
        hw: &mut H,
        recorder: &mut SessionRecorder<L>,
        sink: &mut S,
        battery: f32,
        outcome: &mut CycleOutcome,
    ) where
        H: FeederHardware,
        L: LogStore,
        S: EventSink,
    {
        let record = LogRecord::capture(&mut self.state, kind, hw.now(), battery, retrieval);
        match recorder.record(&record) {
            Ok(()) => {
                outcome.records += 1;
                hw.blink_status(2);
            }
            Err(e) => {
                warn!("{} record lost: {}", kind.label(), e);
                sink.emit(&AppEvent::RecordFailed(e));
            }
        }
    }
}
