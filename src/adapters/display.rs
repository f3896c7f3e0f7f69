//! Status screen adapter.
//!
//! Renders the feeder state on the memory LCD through [`DisplayPort`].
//! As an [`EventSink`] it redraws the full status screen on every
//! `Status` snapshot and overlays a one-line banner while the motor runs.
//! Boot-time screens (setup menu, storage fault) are drawn by `main`
//! directly.

use core::fmt::Write as _;

use heapless::String;

use crate::app::events::{AppEvent, StatusSnapshot};
use crate::app::ports::{DisplayPort, EventSink, Ink};
use crate::menu::{MenuScreen, SetupMenu};
use crate::schedule::Side;
use crate::sensors::battery;

const WIDTH: i16 = 144;

/// Message line above the date.
const BANNER_Y: i16 = 124;
const DATE_Y: i16 = 152;

type Line = String<32>;

fn line(args: core::fmt::Arguments<'_>) -> Line {
    let mut s = Line::new();
    // Overlong text is cut at capacity; every caller fits.
    let _ = s.write_fmt(args);
    s
}

pub struct StatusScreen<D: DisplayPort> {
    display: D,
    /// Poke seen since the last redraw, flagged beside its count.
    poked: Option<Side>,
}

fn count_y(side: Side) -> i16 {
    match side {
        Side::Left => 52,
        Side::Right => 74,
    }
}

impl<D: DisplayPort> StatusScreen<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            poked: None,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Full redraw from one snapshot.
    pub fn draw_status(&mut self, s: &StatusSnapshot) {
        let d = &mut self.display;
        d.clear();

        d.text(2, 2, 2, &line(format_args!("FED{:03}", s.device_number)));
        Self::draw_battery(d, s.battery_volts);
        d.text(2, 24, 1, s.mode.display_name());
        if let Some(n) = s.pokes_remaining {
            d.text(2, 34, 1, &line(format_args!("Next reward in {n}")));
        }

        d.text(2, 52, 2, &line(format_args!("Left: {}", s.left_count)));
        d.text(2, 74, 2, &line(format_args!("Right: {}", s.right_count)));
        d.text(2, 96, 2, &line(format_args!("Pellets: {}", s.pellet_count)));

        // Arrow beside the active poke's count.
        let y = count_y(s.active_side);
        d.triangle([(WIDTH - 12, y), (WIDTH - 12, y + 14), (WIDTH - 4, y + 7)], Ink::Black);
        if let Some(side) = self.poked.take() {
            d.circle(WIDTH - 20, count_y(side) + 7, 3, Ink::Black, true);
        }

        d.circle(WIDTH - 8, BANNER_Y + 4, 4, Ink::Black, s.pellet_present);
        if s.faulted {
            d.text(2, BANNER_Y, 1, "Jam fault!");
        }

        let stamp = s.time.format("%m/%d/%y %H:%M");
        d.text(2, DATE_Y, 1, &line(format_args!("{stamp}")));
        d.refresh();
    }

    fn draw_battery(d: &mut D, volts: f32) {
        let (x, y) = (WIDTH - 34, 4);
        d.stroke_rect(x, y, 28, 12, Ink::Black);
        d.fill_rect(x + 28, y + 3, 3, 6, Ink::Black);
        for bar in 0..i16::from(battery::bars(volts)) {
            d.fill_rect(x + 2 + bar * 6, y + 2, 5, 8, Ink::Black);
        }
    }

    /// Replace the banner line and push it out immediately.
    pub fn banner(&mut self, text: &str) {
        self.display.fill_rect(0, BANNER_Y, WIDTH - 16, 10, Ink::White);
        self.display.text(2, BANNER_Y, 1, text);
        self.display.refresh();
    }

    /// Current page of the boot-time setup menu.
    pub fn show_menu(&mut self, menu: &SetupMenu) {
        let d = &mut self.display;
        d.clear();
        match menu.screen() {
            MenuScreen::SelectMode => {
                d.text(2, 2, 2, "Select mode");
                d.text(2, 40, 2, &line(format_args!("{}", menu.mode())));
                d.text(2, 100, 1, "Left/Right to change");
                d.text(2, 112, 1, "Hold both: device #");
            }
            MenuScreen::DeviceNumber => {
                d.text(2, 2, 2, "Device #");
                d.text(2, 40, 3, &line(format_args!("{:03}", menu.device_number())));
            }
            MenuScreen::TimedWindow => {
                let w = menu.window();
                d.text(2, 2, 2, "Feeding hrs");
                d.text(2, 40, 2, &line(format_args!("Start: {}", w.start_hour)));
                d.text(2, 62, 2, &line(format_args!("End: {}", w.end_hour)));
            }
        }
        d.refresh();
    }

    /// Shown when the session log cannot be opened.
    pub fn show_storage_fault(&mut self) {
        self.display.clear();
        self.display.text(2, 60, 2, "Check SD Card!");
        self.display.refresh();
    }
}

impl<D: DisplayPort> EventSink for StatusScreen<D> {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(snapshot) => self.draw_status(snapshot),
            AppEvent::Poke { side, .. } => self.poked = Some(*side),
            AppEvent::Dispensing => self.banner("Dispensing..."),
            AppEvent::JamRecovery { .. } => self.banner("Clearing jam"),
            AppEvent::DispenseFault(_) => self.banner("Jam fault!"),
            _ => {}
        }
    }
}
