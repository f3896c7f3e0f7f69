//! Boot-time setup menu driven by the two poke beams.
//!
//! ## Gestures
//!
//! | Screen        | Input                     | Effect                               |
//! |---------------|---------------------------|--------------------------------------|
//! | Mode select   | left tap / right tap      | previous / next mode (wraps 0..11)   |
//! | Mode select   | both held >= 1 s          | enter device-number editing          |
//! | Mode select   | idle 2 s                  | confirm                              |
//! | Device number | left / right              | −1 / +1, clamped to 0..700           |
//! | Device number | idle 3 s                  | go to timed-window editing           |
//! | Timed window  | left / right              | start + 1 / end + 1, wrap past 24    |
//! | Timed window  | idle 3 s                  | confirm                              |
//!
//! Taps act on release so that the first beam of a two-beam hold does
//! not also step the mode.  The navigator is a pure state machine fed
//! with sampled levels and a millisecond clock.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{Rgbw, StimulusPort};
use crate::app::state::{DeviceIdentity, MAX_DEVICE_NUMBER, TimedWindow};
use crate::app::stimuli;
use crate::schedule::ScheduleMode;

const BOTH_HOLD_MS: u32 = 1_000;
const MODE_CONFIRM_MS: u32 = 2_000;
const FIELD_CONFIRM_MS: u32 = 3_000;
/// Latest hour a timed window may name; 24 means midnight at the end of the day.
pub const LAST_HOUR: u8 = 24;

/// Which screen the navigator is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuScreen {
    SelectMode,
    DeviceNumber,
    TimedWindow,
}

/// Tone and wipe played to acknowledge an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub tone_hz: u32,
    pub tone_ms: u32,
    pub colour: Rgbw,
}

impl Feedback {
    pub fn play<H: StimulusPort + DelayNs>(self, hw: &mut H) {
        hw.tone(self.tone_hz, self.tone_ms);
        stimuli::color_wipe(hw, self.colour, 40, false);
        stimuli::color_wipe(hw, stimuli::OFF, 20, false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuStep {
    /// Nothing changed.
    Idle,
    /// A field changed or the screen advanced; redraw.
    Adjusted(Option<Feedback>),
    /// Selection confirmed; persist and restart.
    Confirmed(DeviceIdentity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Released,
    /// One or both beams down; `both_since` set once both are.
    Held { both_since: Option<u32> },
    /// A two-beam hold already fired; wait for full release.
    Spent,
}

pub struct SetupMenu {
    screen: MenuScreen,
    gesture: Gesture,
    initial: DeviceIdentity,
    mode_index: u8,
    device_number: u16,
    window: TimedWindow,
    last_input_ms: u32,
    prev: (bool, bool),
}

impl SetupMenu {
    pub fn new(current: DeviceIdentity, now_ms: u32) -> Self {
        Self {
            screen: MenuScreen::SelectMode,
            gesture: Gesture::Released,
            initial: current,
            mode_index: current.mode.to_index(),
            device_number: current.device_number,
            window: current.window,
            last_input_ms: now_ms,
            prev: (false, false),
        }
    }

    /// The splash screen opens the menu if either beam is broken.
    pub fn wants_entry(left: bool, right: bool) -> bool {
        left || right
    }

    pub fn screen(&self) -> MenuScreen {
        self.screen
    }

    pub fn device_number(&self) -> u16 {
        self.device_number
    }

    pub fn window(&self) -> TimedWindow {
        self.window
    }

    /// Mode currently highlighted.
    pub fn mode(&self) -> ScheduleMode {
        if self.mode_index == self.initial.mode.to_index() {
            // Keep a custom fixed-ratio size when the index is unchanged.
            return self.initial.mode;
        }
        ScheduleMode::from_index(self.mode_index, self.window.start_hour, self.window.end_hour)
            .unwrap_or(ScheduleMode::FreeFeeding)
    }

    /// Feed one sample of both beam levels.
    pub fn tick(&mut self, now_ms: u32, left: bool, right: bool) -> MenuStep {
        let (prev_left, prev_right) = self.prev;
        self.prev = (left, right);
        let pressed_left = left && !prev_left;
        let pressed_right = right && !prev_right;

        let step = match self.screen {
            MenuScreen::SelectMode => self.tick_select(now_ms, left, right, prev_left, prev_right),
            MenuScreen::DeviceNumber => self.tick_device(now_ms, pressed_left, pressed_right),
            MenuScreen::TimedWindow => self.tick_window(now_ms, pressed_left, pressed_right),
        };
        if step != MenuStep::Idle {
            return step;
        }

        let idle_ms = now_ms.wrapping_sub(self.last_input_ms);
        if left || right {
            return MenuStep::Idle;
        }
        match self.screen {
            MenuScreen::SelectMode if idle_ms >= MODE_CONFIRM_MS => MenuStep::Confirmed(self.identity()),
            MenuScreen::DeviceNumber if idle_ms >= FIELD_CONFIRM_MS => {
                self.screen = MenuScreen::TimedWindow;
                self.last_input_ms = now_ms;
                MenuStep::Adjusted(None)
            }
            MenuScreen::TimedWindow if idle_ms >= FIELD_CONFIRM_MS => {
                MenuStep::Confirmed(self.identity())
            }
            _ => MenuStep::Idle,
        }
    }

    fn tick_select(
        &mut self,
        now_ms: u32,
        left: bool,
        right: bool,
        prev_left: bool,
        prev_right: bool,
    ) -> MenuStep {
        match self.gesture {
            Gesture::Released => {
                if left || right {
                    self.gesture = Gesture::Held { both_since: (left && right).then_some(now_ms) };
                    self.last_input_ms = now_ms;
                }
                MenuStep::Idle
            }
            Gesture::Held { both_since } => {
                if left && right {
                    let since = both_since.unwrap_or(now_ms);
                    self.gesture = Gesture::Held { both_since: Some(since) };
                    self.last_input_ms = now_ms;
                    if now_ms.wrapping_sub(since) >= BOTH_HOLD_MS {
                        self.gesture = Gesture::Spent;
                        self.screen = MenuScreen::DeviceNumber;
                        return MenuStep::Adjusted(Some(Feedback {
                            tone_hz: 3_000,
                            tone_ms: 500,
                            colour: (2, 2, 2, 0),
                        }));
                    }
                    return MenuStep::Idle;
                }
                if left || right {
                    return MenuStep::Idle;
                }
                // Tap released.  A brief overlap of both beams still counts
                // as a tap on the side that went down first.
                self.gesture = Gesture::Released;
                self.last_input_ms = now_ms;
                if prev_right && !prev_left {
                    self.mode_index = (self.mode_index + 1) % ScheduleMode::MENU_COUNT;
                    MenuStep::Adjusted(Some(Feedback {
                        tone_hz: 2_500,
                        tone_ms: 200,
                        colour: (2, 2, 0, 0),
                    }))
                } else {
                    self.mode_index = self
                        .mode_index
                        .checked_sub(1)
                        .unwrap_or(ScheduleMode::MENU_COUNT - 1);
                    MenuStep::Adjusted(Some(Feedback {
                        tone_hz: 2_500,
                        tone_ms: 200,
                        colour: (2, 0, 2, 0),
                    }))
                }
            }
            Gesture::Spent => {
                if !left && !right {
                    self.gesture = Gesture::Released;
                }
                MenuStep::Idle
            }
        }
    }

    fn tick_device(&mut self, now_ms: u32, left: bool, right: bool) -> MenuStep {
        if !(left || right) {
            return MenuStep::Idle;
        }
        if right {
            self.device_number = (self.device_number + 1).min(MAX_DEVICE_NUMBER);
        }
        if left {
            self.device_number = self.device_number.saturating_sub(1);
        }
        self.last_input_ms = now_ms;
        MenuStep::Adjusted(None)
    }

    fn tick_window(&mut self, now_ms: u32, left: bool, right: bool) -> MenuStep {
        if !(left || right) {
            return MenuStep::Idle;
        }
        let w = &mut self.window;
        if left {
            w.start_hour = if w.start_hour >= LAST_HOUR { 0 } else { w.start_hour + 1 };
            if w.start_hour > w.end_hour {
                w.end_hour = (w.start_hour + 1).min(LAST_HOUR);
            }
        }
        if right {
            w.end_hour = if w.end_hour >= LAST_HOUR { 0 } else { w.end_hour + 1 };
            if w.start_hour > w.end_hour {
                w.start_hour = w.end_hour.saturating_sub(1);
            }
        }
        self.last_input_ms = now_ms;
        MenuStep::Adjusted(None)
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device_number, self.mode(), self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> SetupMenu {
        SetupMenu::new(DeviceIdentity::default(), 0)
    }

    /// Press and release one side, 100 ms each.
    fn tap(m: &mut SetupMenu, t: &mut u32, left: bool, right: bool) -> MenuStep {
        *t += 100;
        m.tick(*t, left, right);
        *t += 100;
        m.tick(*t, false, false)
    }

    #[test]
    fn right_tap_advances_mode() {
        let mut m = menu();
        let mut t = 0;
        assert!(matches!(tap(&mut m, &mut t, false, true), MenuStep::Adjusted(Some(_))));
        assert_eq!(m.mode(), ScheduleMode::FixedRatio(1));
    }

    #[test]
    fn left_tap_wraps_to_timed() {
        let mut m = menu();
        let mut t = 0;
        tap(&mut m, &mut t, true, false);
        assert!(matches!(m.mode(), ScheduleMode::TimedFeeding { .. }));
    }

    #[test]
    fn idle_confirms_selection() {
        let mut m = menu();
        let mut t = 0;
        tap(&mut m, &mut t, false, true);
        tap(&mut m, &mut t, false, true);
        assert_eq!(m.tick(t + 1_999, false, false), MenuStep::Idle);
        match m.tick(t + 2_000, false, false) {
            MenuStep::Confirmed(id) => assert_eq!(id.mode, ScheduleMode::FixedRatio(3)),
            other => panic!("expected confirm, got {other:?}"),
        }
    }

    #[test]
    fn unchanged_index_keeps_custom_ratio() {
        let current = DeviceIdentity::new(5, ScheduleMode::FixedRatio(10), TimedWindow::default());
        let m = SetupMenu::new(current, 0);
        assert_eq!(m.mode(), ScheduleMode::FixedRatio(10));
    }

    #[test]
    fn both_held_enters_device_number_then_window() {
        let mut m = menu();
        m.tick(0, true, true);
        assert_eq!(m.tick(500, true, true), MenuStep::Idle);
        assert!(matches!(m.tick(1_000, true, true), MenuStep::Adjusted(Some(_))));
        assert_eq!(m.screen(), MenuScreen::DeviceNumber);
        assert_eq!(m.mode(), ScheduleMode::FreeFeeding, "hold must not step the mode");

        // Release, then +2 −1.
        let mut t = 1_100;
        m.tick(t, false, false);
        tap(&mut m, &mut t, false, true);
        tap(&mut m, &mut t, false, true);
        tap(&mut m, &mut t, true, false);
        assert_eq!(m.device_number(), 1);

        assert_eq!(m.tick(t + 3_000, false, false), MenuStep::Adjusted(None));
        assert_eq!(m.screen(), MenuScreen::TimedWindow);
    }

    #[test]
    fn device_number_clamps() {
        let current = DeviceIdentity::new(MAX_DEVICE_NUMBER, ScheduleMode::FreeFeeding, TimedWindow::default());
        let mut m = SetupMenu::new(current, 0);
        m.screen = MenuScreen::DeviceNumber;
        let mut t = 0;
        tap(&mut m, &mut t, false, true);
        assert_eq!(m.device_number(), MAX_DEVICE_NUMBER);
    }

    #[test]
    fn window_start_pushes_end() {
        let mut m = menu();
        m.screen = MenuScreen::TimedWindow;
        m.window = TimedWindow { start_hour: 20, end_hour: 20 };
        let mut t = 0;
        tap(&mut m, &mut t, true, false);
        assert_eq!(m.window(), TimedWindow { start_hour: 21, end_hour: 22 });
    }

    #[test]
    fn window_end_wraps_and_pulls_start() {
        let mut m = menu();
        m.screen = MenuScreen::TimedWindow;
        m.window = TimedWindow { start_hour: 3, end_hour: 24 };
        let mut t = 0;
        tap(&mut m, &mut t, false, true);
        assert_eq!(m.window(), TimedWindow { start_hour: 0, end_hour: 0 });
    }
}
