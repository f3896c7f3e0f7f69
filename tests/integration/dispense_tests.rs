//! Dispense controller against the shared mock: escalation order,
//! pellet accounting and the motor-off guarantee.

use super::mock_hw::{MockHardware, RecordingSink};

use fed3::app::events::AppEvent;
use fed3::config::FeederConfig;
use fed3::dispense::{DispenseController, JamStrategy};
use fed3::error::DispenseFault;

fn feed(hw: &mut MockHardware) -> (Result<fed3::dispense::DispenseReport, DispenseFault>, RecordingSink) {
    let mut sink = RecordingSink::default();
    let mut ctl = DispenseController::new(FeederConfig::default(), 11);
    let result = ctl.feed(hw, &mut sink);
    (result, sink)
}

/// Empty for exactly `n` bursts, pellet on burst `n + 1`.
fn absent_for(n: u32) -> MockHardware {
    let mut hw = MockHardware::new();
    hw.bursts_to_drop = Some(n + 1);
    hw
}

/// Burst counter seen by the schedule at `total`: a full clear at 20
/// starts it over.
fn counter_at(total: u32) -> u32 {
    (total - 1) % 20 + 1
}

#[test]
fn escalations_match_schedule_up_to_last_empty_burst() {
    for n in [0, 4, 5, 9, 10, 19, 20, 24, 25, 30, 34] {
        let mut hw = absent_for(n);
        let (result, sink) = feed(&mut hw);
        let report = result.unwrap();

        let expected: Vec<(u32, JamStrategy)> = (1..=n)
            .filter_map(|b| JamStrategy::for_burst(b).map(|s| (b, s)))
            .collect();
        let got: Vec<(u32, JamStrategy)> = report.escalations.iter().copied().collect();
        assert_eq!(got, expected, "n = {n}");
        assert_eq!(report.bursts, n + 1);
        assert_eq!(
            sink.count(|e| matches!(e, AppEvent::JamRecovery { .. })),
            expected.len()
        );
        assert!(hw.well);
        assert!(!hw.motor_on);
    }
}

#[test]
fn schedule_repeats_after_each_full_clear() {
    for n in [35, 40, 45, 60] {
        let mut hw = absent_for(n);
        let (result, _) = feed(&mut hw);
        let report = result.unwrap();

        let expected: Vec<(u32, JamStrategy)> = (1..=n)
            .filter_map(|b| JamStrategy::for_burst(counter_at(b)).map(|s| (b, s)))
            .collect();
        let got: Vec<(u32, JamStrategy)> = report.escalations.iter().copied().collect();
        assert_eq!(got, expected, "n = {n}");
        assert_eq!(
            report.jam_clears,
            expected.iter().filter(|(_, s)| *s != JamStrategy::MinorNudge).count() as u32
        );
    }
}

#[test]
fn every_feed_announces_itself_first() {
    let mut hw = absent_for(12);
    let (_, sink) = feed(&mut hw);
    assert_eq!(sink.events.first(), Some(&AppEvent::Dispensing));
}

#[test]
fn jammed_feeder_faults_at_burst_ceiling() {
    let mut hw = MockHardware::new();
    hw.bursts_to_drop = None;
    let (result, sink) = feed(&mut hw);
    assert_eq!(result.unwrap_err(), DispenseFault::ExceededAttempts { bursts: 80 });
    assert!(!hw.motor_on);
    assert_eq!(hw.steps_while_disabled, 0);
    assert!(sink.count(|e| matches!(e, AppEvent::JamRecovery { strategy: JamStrategy::FullClear, .. })) >= 2);
}

#[test]
fn pellet_already_present_needs_no_motor() {
    let mut hw = MockHardware::new();
    hw.well = true;
    let (result, _) = feed(&mut hw);
    let report = result.unwrap();
    assert_eq!(report.bursts, 0);
    assert!(report.escalations.is_empty());
}
