//! Mock hardware, storage and event sink for integration tests.
//!
//! `MockHardware` keeps a virtual clock advanced only by `DelayNs`, so a
//! full jam recovery runs instantly.  The motor model drops a pellet into
//! the well once `bursts_to_drop` dispense bursts have been commanded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use embedded_hal::delay::DelayNs;

use fed3::app::events::AppEvent;
use fed3::app::ports::{
    ClockPort, EventSink, LogStore, MotorPort, Rgbw, SensorPort, SettingsStore, StimulusPort,
    StorageError,
};
use fed3::config::FeederConfig;
use fed3::events::EventCapture;
use fed3::schedule::Side;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StimulusCall {
    Tone { freq_hz: u32, duration_ms: u32 },
    SyncPulse { duration_ms: u32 },
    Blink { times: u8 },
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub well: bool,
    pub left: bool,
    pub right: bool,
    /// Dispense bursts until a pellet drops; `None` = jammed for good.
    pub bursts_to_drop: Option<u32>,
    burst_steps: i32,
    burst_calls: u32,
    pub motor_on: bool,
    pub steps_while_disabled: u32,
    pub pixels: [Rgbw; 8],
    pub calls: Vec<StimulusCall>,
    /// Break this beam, edge interrupt included, partway through the next
    /// cycle (at the battery read, after the flags are drained).
    pub press_mid_cycle: Option<(Side, Arc<EventCapture>)>,
    start: NaiveDateTime,
    now_ns: u64,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        let config = FeederConfig::default();
        Self {
            well: false,
            left: false,
            right: false,
            bursts_to_drop: Some(1),
            burst_steps: config.burst_steps,
            burst_calls: 0,
            motor_on: false,
            steps_while_disabled: 0,
            pixels: [(0, 0, 0, 0); 8],
            calls: Vec::new(),
            press_mid_cycle: None,
            start: NaiveDate::from_ymd_opt(2026, 10, 19)
                .and_then(|d| d.and_hms_opt(13, 0, 0))
                .unwrap(),
            now_ns: 0,
        }
    }

    /// Set the wall-clock hour without touching uptime.
    pub fn at_hour(mut self, hour: u32) -> Self {
        self.start = self.start.date().and_hms_opt(hour, 0, 0).unwrap();
        self
    }

    /// Advance the virtual clock.
    pub fn advance_ms(&mut self, ms: u64) {
        self.now_ns += ms * 1_000_000;
    }

    pub fn sync_pulses(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, StimulusCall::SyncPulse { .. }))
            .count()
    }

    pub fn tones(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StimulusCall::Tone { freq_hz, duration_ms } => Some((*freq_hz, *duration_ms)),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn pellet_present(&mut self) -> bool {
        self.well
    }

    fn poke_pressed(&mut self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn battery_volts(&mut self) -> f32 {
        if let Some((side, capture)) = self.press_mid_cycle.take() {
            match side {
                Side::Left => self.left = true,
                Side::Right => self.right = true,
            }
            capture.on_poke_edge(side, true);
        }
        3.92
    }
}

impl MotorPort for MockHardware {
    fn enable_motor(&mut self) {
        self.motor_on = true;
    }

    fn step(&mut self, steps: i32) {
        if !self.motor_on {
            self.steps_while_disabled += 1;
            return;
        }
        if steps == self.burst_steps {
            self.burst_calls += 1;
            if self
                .bursts_to_drop
                .is_some_and(|n| self.burst_calls >= n * 9)
            {
                self.well = true;
                self.burst_calls = 0;
            }
        }
    }

    fn release_motor(&mut self) {
        self.motor_on = false;
    }
}

impl StimulusPort for MockHardware {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        self.calls.push(StimulusCall::Tone { freq_hz, duration_ms });
    }

    fn set_pixel(&mut self, index: usize, colour: Rgbw) {
        if let Some(p) = self.pixels.get_mut(index) {
            *p = colour;
        }
    }

    fn show_pixels(&mut self) {}

    fn sync_pulse(&mut self, duration_ms: u32) {
        self.calls.push(StimulusCall::SyncPulse { duration_ms });
    }

    fn blink_status(&mut self, times: u8) {
        self.calls.push(StimulusCall::Blink { times });
    }
}

impl ClockPort for MockHardware {
    fn now(&self) -> NaiveDateTime {
        self.start + Duration::milliseconds((self.now_ns / 1_000_000) as i64)
    }

    fn uptime_ms(&self) -> u64 {
        self.now_ns / 1_000_000
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }
}

// ── MemStore ──────────────────────────────────────────────────

/// In-memory SD card: named files of lines plus integer settings.
#[derive(Default)]
pub struct MemStore {
    pub files: HashMap<String, Vec<String>>,
    pub settings: HashMap<String, i32>,
    pub current: Option<String>,
    /// Fail every append after this many lines.
    pub fail_after: Option<usize>,
}

#[allow(dead_code)]
impl MemStore {
    pub fn lines(&self) -> &[String] {
        self.current
            .as_ref()
            .and_then(|name| self.files.get(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Data rows of the current file, header excluded.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lines()
            .iter()
            .skip(1)
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect()
    }
}

impl LogStore for MemStore {
    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        self.files.insert(name.to_string(), Vec::new());
        self.current = Some(name.to_string());
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        let name = self.current.clone().ok_or(StorageError::NotOpen)?;
        let file = self.files.entry(name).or_default();
        if self.fail_after.is_some_and(|n| file.len() >= n) {
            return Err(StorageError::WriteFailed);
        }
        file.push(line.to_string());
        Ok(())
    }
}

impl SettingsStore for MemStore {
    fn read_setting(&self, key: &str) -> Result<Option<i32>, StorageError> {
        Ok(self.settings.get(key).copied())
    }

    fn write_setting(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        self.settings.insert(key.to_string(), value);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
