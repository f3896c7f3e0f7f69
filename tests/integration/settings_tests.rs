//! Session identity persistence and the setup menu that edits it.

use super::mock_hw::{MemStore, MockHardware};

use fed3::adapters::sd_card::{
    self, DEVICE_NUMBER_KEY, MODE_KEY, RATIO_KEY, START_HOUR_KEY, STOP_HOUR_KEY,
};
use fed3::app::state::{DeviceIdentity, TimedWindow};
use fed3::menu::{MenuScreen, MenuStep, SetupMenu};
use fed3::schedule::ScheduleMode;

#[test]
fn identity_round_trips_through_settings() {
    let mut store = MemStore::default();
    let identity = DeviceIdentity::new(
        310,
        ScheduleMode::TimedFeeding { start_hour: 6, end_hour: 18 },
        TimedWindow { start_hour: 6, end_hour: 18 },
    );
    sd_card::save_identity(&mut store, &identity).unwrap();
    assert_eq!(store.settings[MODE_KEY], 11);
    assert_eq!(store.settings[START_HOUR_KEY], 6);
    assert_eq!(sd_card::load_identity(&store), identity);
}

#[test]
fn window_ending_at_midnight_round_trips() {
    let mut store = MemStore::default();
    let window = TimedWindow { start_hour: 20, end_hour: 24 };
    let identity = DeviceIdentity::new(
        9,
        ScheduleMode::TimedFeeding { start_hour: 20, end_hour: 24 },
        window,
    );
    sd_card::save_identity(&mut store, &identity).unwrap();
    assert_eq!(store.settings[STOP_HOUR_KEY], 24);

    let loaded = sd_card::load_identity(&store);
    assert_eq!(loaded.window, window);
    assert_eq!(loaded.mode, ScheduleMode::TimedFeeding { start_hour: 20, end_hour: 24 });
}

#[test]
fn hour_past_midnight_falls_back() {
    let mut store = MemStore::default();
    store.settings.insert(STOP_HOUR_KEY.into(), 25);
    assert_eq!(sd_card::load_identity(&store).window, TimedWindow::default());
}

#[test]
fn custom_ratio_survives_in_its_own_key() {
    let mut store = MemStore::default();
    let identity = DeviceIdentity::new(1, ScheduleMode::FixedRatio(8), TimedWindow::default());
    sd_card::save_identity(&mut store, &identity).unwrap();
    assert_eq!(store.settings[RATIO_KEY], 8);
    assert_eq!(sd_card::load_identity(&store).mode, ScheduleMode::FixedRatio(8));
}

#[test]
fn out_of_range_device_number_is_clamped() {
    let mut store = MemStore::default();
    store.settings.insert(DEVICE_NUMBER_KEY.into(), 5_000);
    assert_eq!(sd_card::load_identity(&store).device_number, 700);
}

/// Drive the menu the way the boot loop does, 10 ms per tick.
fn run(menu: &mut SetupMenu, t: &mut u32, left: bool, right: bool, ms: u32) -> Option<MenuStep> {
    let mut last = None;
    for _ in 0..ms / 10 {
        *t += 10;
        match menu.tick(*t, left, right) {
            MenuStep::Idle => {}
            step => last = Some(step),
        }
    }
    last
}

#[test]
fn menu_session_selects_mode_and_device_then_persists() {
    let mut store = MemStore::default();
    let mut hw = MockHardware::new();
    let mut menu = SetupMenu::new(sd_card::load_identity(&store), 0);
    let mut t = 0;

    // Two right taps: free feeding → FR1 → FR3.
    for _ in 0..2 {
        run(&mut menu, &mut t, false, true, 100);
        if let Some(MenuStep::Adjusted(Some(fb))) = run(&mut menu, &mut t, false, false, 50) {
            fb.play(&mut hw);
        }
    }
    assert_eq!(menu.mode(), ScheduleMode::FixedRatio(3));
    assert!(!hw.tones().is_empty());

    // Hold both to reach the device number, bump it twice.
    run(&mut menu, &mut t, true, true, 1_100);
    assert_eq!(menu.screen(), MenuScreen::DeviceNumber);
    run(&mut menu, &mut t, false, false, 50);
    for _ in 0..2 {
        run(&mut menu, &mut t, false, true, 10);
        run(&mut menu, &mut t, false, false, 50);
    }
    assert_eq!(menu.device_number(), 2);

    // Idle through the timed window page to confirm.
    let mut confirmed = None;
    for _ in 0..1_000 {
        if let Some(MenuStep::Confirmed(id)) = run(&mut menu, &mut t, false, false, 10) {
            confirmed = Some(id);
            break;
        }
    }
    let chosen = confirmed.expect("menu confirms after idling");
    sd_card::save_identity(&mut store, &chosen).unwrap();

    let reloaded = sd_card::load_identity(&store);
    assert_eq!(reloaded.device_number, 2);
    assert_eq!(reloaded.mode, ScheduleMode::FixedRatio(3));
}
