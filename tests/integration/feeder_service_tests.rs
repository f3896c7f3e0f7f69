//! Integration tests for the EventCapture → FeederService → recorder
//! pipeline, one session per test against mock hardware.

use std::sync::Arc;

use super::mock_hw::{MemStore, MockHardware, RecordingSink};

use chrono::NaiveDate;
use fed3::app::events::AppEvent;
use fed3::app::service::{CycleOutcome, FeederService};
use fed3::app::state::{DeviceIdentity, TimedWindow};
use fed3::app::stimuli::TRACKING_CUE;
use fed3::config::FeederConfig;
use fed3::events::EventCapture;
use fed3::recorder::SessionRecorder;
use fed3::schedule::{ScheduleMode, Side};

struct Rig {
    svc: FeederService,
    hw: MockHardware,
    rec: SessionRecorder<MemStore>,
    sink: RecordingSink,
}

impl Rig {
    fn new(mode: ScheduleMode) -> Self {
        Self::with(mode, MockHardware::new(), MemStore::default())
    }

    fn with(mode: ScheduleMode, mut hw: MockHardware, store: MemStore) -> Self {
        let window = match mode {
            ScheduleMode::TimedFeeding { start_hour, end_hour } => TimedWindow { start_hour, end_hour },
            _ => TimedWindow::default(),
        };
        let identity = DeviceIdentity::new(4, mode, window);
        let mut svc = FeederService::new(identity, FeederConfig::default(), 7);
        let mut sink = RecordingSink::default();
        svc.start(&mut hw, &mut sink);
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let rec = SessionRecorder::open(store, 4, date).unwrap();
        Self { svc, hw, rec, sink }
    }

    /// A tap short enough to be seen only by the edge ISR.
    fn poke(&mut self, side: Side) -> CycleOutcome {
        let cap = EventCapture::new();
        cap.on_poke_edge(side, true);
        self.svc.run_cycle(&cap, &mut self.hw, &mut self.rec, &mut self.sink)
    }

    fn idle(&mut self) -> CycleOutcome {
        let cap = EventCapture::new();
        self.svc.run_cycle(&cap, &mut self.hw, &mut self.rec, &mut self.sink)
    }

    /// Take the pellet out of the well and let a cycle notice.
    fn retrieve(&mut self, after_ms: u64) -> CycleOutcome {
        self.hw.advance_ms(after_ms);
        self.hw.well = false;
        let cap = EventCapture::new();
        cap.on_pellet_edge(false);
        self.svc.run_cycle(&cap, &mut self.hw, &mut self.rec, &mut self.sink)
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.rec.store().rows()
    }

    /// `Event` column of every row.
    fn events(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r[6].clone()).collect()
    }
}

// ── End-to-end FR3 ────────────────────────────────────────────

#[test]
fn fr3_three_left_pokes_dispense_exactly_once() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(3));

    assert!(!rig.poke(Side::Left).dispensed);
    assert!(!rig.poke(Side::Left).dispensed);
    let out = rig.poke(Side::Left);

    assert!(out.dispensed);
    let state = rig.svc.state();
    assert_eq!(state.well.pellet_count, 1);
    assert!(!state.gate.ratio_met, "gate must close on delivery");
    assert!(state.well.present);
    assert_eq!(rig.events(), ["Poke", "Poke", "Poke", "Pellet"]);

    let pellet = &rig.rows()[3];
    assert_eq!(pellet[5], "FR3");
    assert_eq!(pellet[7], "Left");
    assert_eq!(pellet[8], "3");
    assert_eq!(pellet[10], "1");
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PelletDelivered { .. })), 1);
}

#[test]
fn idle_cycles_add_no_records() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(3));
    for _ in 0..3 {
        rig.poke(Side::Left);
    }
    let written = rig.rec.records_written();

    for _ in 0..10 {
        let out = rig.idle();
        assert_eq!(out, CycleOutcome::default());
    }
    assert_eq!(rig.rec.records_written(), written);
    assert_eq!(rig.svc.state().left.count, 3);
    assert_eq!(rig.svc.cycle_count(), 13);
}

#[test]
fn pokes_while_pellet_waits_are_counted_not_rewarded() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(1));
    rig.poke(Side::Left);
    assert!(rig.hw.well);

    let out = rig.poke(Side::Left);
    assert!(!out.dispensed);
    assert_eq!(out.records, 1);
    assert_eq!(rig.svc.state().left.count, 2);
    assert!(!rig.svc.state().gate.ratio_met);
}

#[test]
fn press_landing_after_drain_is_counted_once() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(5));
    let capture = Arc::new(EventCapture::new());
    rig.hw.press_mid_cycle = Some((Side::Right, Arc::clone(&capture)));

    for _ in 0..3 {
        rig.svc.run_cycle(&capture, &mut rig.hw, &mut rig.rec, &mut rig.sink);
    }

    assert_eq!(rig.svc.state().right.count, 1);
    assert_eq!(rig.events(), ["Poke"]);
}

#[test]
fn inactive_pokes_never_open_the_gate() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(1));
    for _ in 0..5 {
        assert!(!rig.poke(Side::Right).dispensed);
    }
    assert_eq!(rig.svc.state().right.count, 5);
    assert_eq!(rig.svc.state().well.pellet_count, 0);
}

// ── Retrieval interval column ─────────────────────────────────

#[test]
fn retrieval_logged_in_seconds_with_sync_pulse() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(1));
    rig.poke(Side::Left);
    let out = rig.retrieve(45_000);

    assert_eq!(out.records, 1);
    let last = rig.rows().pop().unwrap();
    assert_eq!(last[6], "Retrieval");
    assert_eq!(last[11], "45");
    assert_eq!(rig.hw.sync_pulses(), 1);
}

#[test]
fn retrieval_past_timeout_is_sentinel() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(1));
    rig.poke(Side::Left);
    rig.retrieve(121_000);
    assert_eq!(rig.rows().pop().unwrap()[11], "Timed_out");
}

#[test]
fn poke_rows_carry_nan_retrieval() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(3));
    rig.poke(Side::Right);
    assert_eq!(rig.rows()[0][11], "nan");
}

// ── Other schedules ───────────────────────────────────────────

#[test]
fn progressive_ratio_thresholds_grow() {
    let mut rig = Rig::new(ScheduleMode::ProgressiveRatio);
    let mut rewarded_at = Vec::new();
    for poke in 1..=8 {
        if rig.poke(Side::Left).dispensed {
            rewarded_at.push(poke);
            rig.retrieve(1_000);
        }
    }
    // Thresholds 1, 1+1, 2+2, 4+4.
    assert_eq!(rewarded_at, vec![1, 2, 4, 8]);
}

#[test]
fn free_feeding_keeps_the_well_stocked() {
    let mut rig = Rig::new(ScheduleMode::FreeFeeding);
    assert!(rig.idle().dispensed);
    assert!(!rig.idle().dispensed, "full well blocks the next pellet");
    rig.retrieve(10_000);
    assert_eq!(rig.svc.state().well.pellet_count, 2);
    assert_eq!(rig.events(), ["Pellet", "Retrieval", "Pellet"]);
}

#[test]
fn timed_feeding_only_inside_window() {
    let mode = ScheduleMode::TimedFeeding { start_hour: 8, end_hour: 12 };
    let mut rig = Rig::with(mode, MockHardware::new().at_hour(13), MemStore::default());
    assert!(!rig.idle().dispensed);

    let mut rig = Rig::with(mode, MockHardware::new().at_hour(9), MemStore::default());
    assert!(rig.idle().dispensed);
    assert_eq!(rig.rows()[0][5], "Timed_8to12");
}

#[test]
fn reversed_mode_rewards_right_side() {
    let mut rig = Rig::new(ScheduleMode::FixedRatioReversed);
    assert!(!rig.poke(Side::Left).dispensed);
    assert!(rig.poke(Side::Right).dispensed);
    assert_eq!(rig.rows().pop().unwrap()[7], "Right");
}

#[test]
fn light_tracking_redraws_side_and_cue() {
    let mut rig = Rig::new(ScheduleMode::LightTracking);
    assert_eq!(rig.hw.pixels[0], TRACKING_CUE, "cue starts on the left");
    assert!(rig.poke(Side::Left).dispensed);

    let side = rig.svc.state().gate.active_side;
    let index = if side == Side::Left { 0 } else { 7 };
    assert_eq!(rig.hw.pixels[index], TRACKING_CUE);
    assert_eq!(rig.hw.pixels[7 - index], (0, 0, 0, 0));
}

#[test]
fn extinction_records_but_never_feeds() {
    let mut rig = Rig::new(ScheduleMode::Extinction);
    for _ in 0..3 {
        assert!(!rig.poke(Side::Left).dispensed);
    }
    assert_eq!(rig.events(), ["Poke", "Poke", "Poke"]);
    assert!(rig.hw.tones().is_empty(), "no cue in extinction");
}

#[test]
fn self_stimulation_pulses_instead_of_feeding() {
    let mut rig = Rig::new(ScheduleMode::SelfStimulation);
    rig.poke(Side::Left);
    assert_eq!(rig.hw.sync_pulses(), 1);
    assert_eq!(rig.svc.state().well.pellet_count, 0);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::StimulusDelivered { side: Side::Left })), 1);
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn jam_fault_logs_row_and_retries_next_cycle() {
    let mut hw = MockHardware::new();
    hw.bursts_to_drop = None;
    let mut rig = Rig::with(ScheduleMode::FixedRatio(1), hw, MemStore::default());

    let out = rig.poke(Side::Left);
    assert!(!out.dispensed);
    assert_eq!(rig.events(), ["Poke", "Hardware_Fault"]);
    assert!(rig.svc.state().gate.ratio_met);
    assert!(!rig.hw.motor_on);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::DispenseFault(_))), 1);

    // Jam cleared by hand: the owed pellet goes out without another poke.
    rig.hw.bursts_to_drop = Some(1);
    assert!(rig.idle().dispensed);
    assert!(rig.svc.state().dispense_fault.is_none());
}

#[test]
fn pellet_freed_after_fault_is_the_owed_reward() {
    let mut hw = MockHardware::new();
    hw.bursts_to_drop = None;
    let mut rig = Rig::with(ScheduleMode::FixedRatio(1), hw, MemStore::default());
    rig.poke(Side::Left);
    assert!(rig.svc.state().gate.ratio_met);

    // The jam works loose between cycles.
    rig.hw.well = true;
    assert!(rig.idle().dispensed);
    assert_eq!(rig.events(), ["Poke", "Hardware_Fault", "Pellet"]);
    assert!(!rig.svc.state().gate.ratio_met);
    assert!(rig.svc.state().dispense_fault.is_none());

    // Taking it logs a timed retrieval and earns nothing more.
    rig.hw.bursts_to_drop = Some(1);
    rig.retrieve(30_000);
    assert!(!rig.idle().dispensed);
    assert_eq!(rig.svc.state().well.pellet_count, 1);
    assert!(!rig.hw.well);
    assert_eq!(rig.rows().pop().unwrap()[11], "30");
}

#[test]
fn jam_recovery_shows_in_motor_turns() {
    let mut hw = MockHardware::new();
    hw.bursts_to_drop = Some(11);
    let mut rig = Rig::with(ScheduleMode::FixedRatio(1), hw, MemStore::default());
    rig.poke(Side::Left);

    let rows = rig.rows();
    assert_eq!(rows[0][4], "0");
    // 11 bursts plus one vibrate clear (×10); the nudge at 5 is not a clear.
    assert_eq!(rows[1][4], "21");
    assert_eq!(rig.hw.steps_while_disabled, 0);
}

#[test]
fn failed_write_is_reported_and_session_continues() {
    let store = MemStore {
        fail_after: Some(2),
        ..MemStore::default()
    };
    let mut rig = Rig::with(ScheduleMode::FixedRatio(1), MockHardware::new(), store);

    let out = rig.poke(Side::Left);
    assert!(out.dispensed);
    assert_eq!(out.records, 1, "pellet row lost");
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::RecordFailed(_))), 1);
    assert_eq!(rig.svc.state().well.pellet_count, 1);
}

#[test]
fn both_pokes_held_requests_reset() {
    let mut rig = Rig::new(ScheduleMode::FixedRatio(5));
    rig.hw.left = true;
    rig.hw.right = true;
    let out = rig.idle();
    assert!(out.reset_requested);
    assert!(rig.sink.events.contains(&AppEvent::ResetRequested));
}
