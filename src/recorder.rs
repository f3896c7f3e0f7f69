//! Session recorder: one CSV row per poke, delivery, retrieval and
//! hardware fault.
//!
//! Rows are appended to a per-session file and flushed before
//! [`SessionRecorder::record`] returns, so a power cut loses at most the
//! row being written.

use core::fmt::{self, Write as _};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info};

use crate::app::ports::{LogStore, StorageError};
use crate::app::state::DeviceState;
use crate::schedule::Side;

/// Column header, written once when the session file is created.
pub const HEADER: &str = "MM:DD:YYYY hh:mm:ss,FED_Version,Device_Number,Battery_Voltage,\
Motor_Turns,Session_Type,Event,Active_Poke,Left_Poke_Count,Right_Poke_Count,Pellet_Count,\
Retrieval_Time";

/// Highest session sequence number per device per day.
pub const MAX_SEQUENCE: u8 = 99;

const LINE_CAPACITY: usize = 192;

pub type Filename = heapless::String<24>;

// ---------------------------------------------------------------------------
// Record fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Poke,
    /// A pellet reached the well.
    Pellet,
    /// The pellet left the well; carries the retrieval interval.
    Retrieval,
    /// A dispense gave up at its ceiling.
    HardwareFault,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Poke => "Poke",
            Self::Pellet => "Pellet",
            Self::Retrieval => "Retrieval",
            Self::HardwareFault => "Hardware_Fault",
        }
    }
}

/// `Retrieval_Time` column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalInterval {
    /// Not a retrieval row.
    NotApplicable,
    Seconds(f32),
    /// The pellet sat longer than the retrieval timeout.
    TimedOut,
}

impl RetrievalInterval {
    /// Classify the time between delivery and removal.  Anything strictly
    /// longer than `timeout_secs` is a timeout.
    pub fn classify(elapsed_ms: u64, timeout_secs: u32) -> Self {
        if elapsed_ms > u64::from(timeout_secs) * 1000 {
            Self::TimedOut
        } else {
            Self::Seconds(elapsed_ms as f32 / 1000.0)
        }
    }
}

impl fmt::Display for RetrievalInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NotApplicable => f.write_str("nan"),
            Self::TimedOut => f.write_str("Timed_out"),
            Self::Seconds(secs) => {
                // Centisecond resolution, trailing zeros dropped.
                let centis = (secs.max(0.0) * 100.0).round() as u32;
                let (whole, frac) = (centis / 100, centis % 100);
                match frac {
                    0 => write!(f, "{whole}"),
                    _ if frac % 10 == 0 => write!(f, "{whole}.{}", frac / 10),
                    _ => write!(f, "{whole}.{frac:02}"),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

/// One immutable row of the session log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub device_number: u16,
    pub battery_volts: f32,
    pub motor_turns: u32,
    pub session_label: heapless::String<24>,
    pub event: EventKind,
    pub active_side: Side,
    pub left_count: u32,
    pub right_count: u32,
    pub pellet_count: u32,
    pub retrieval: RetrievalInterval,
}

impl LogRecord {
    /// Snapshot `state` into a row.  Consumes the motor tally.
    pub fn capture(
        state: &mut DeviceState,
        event: EventKind,
        timestamp: NaiveDateTime,
        battery_volts: f32,
        retrieval: RetrievalInterval,
    ) -> Self {
        Self {
            timestamp,
            device_number: state.identity.device_number,
            battery_volts,
            motor_turns: state.motor.take(),
            session_label: state.mode().session_label(state.well.pellet_count),
            event,
            active_side: state.gate.active_side,
            left_count: state.left.count,
            right_count: state.right.count,
            pellet_count: state.well.pellet_count,
            retrieval,
        }
    }

    pub fn to_line(&self) -> Result<heapless::String<LINE_CAPACITY>, fmt::Error> {
        let mut line = heapless::String::new();
        write!(
            line,
            "{},{},{},{:.2},{},{},{},{},{},{},{},{}",
            self.timestamp.format("%-m/%-d/%Y %-H:%M:%S"),
            env!("CARGO_PKG_VERSION"),
            self.device_number,
            self.battery_volts,
            self.motor_turns,
            self.session_label,
            self.event.label(),
            self.active_side.label(),
            self.left_count,
            self.right_count,
            self.pellet_count,
            self.retrieval,
        )?;
        Ok(line)
    }
}

// ---------------------------------------------------------------------------
// Filenames
// ---------------------------------------------------------------------------

/// `FED{device:03}_{MMDDYY}_{seq:02}.CSV`
pub fn session_filename(device_number: u16, date: NaiveDate, seq: u8) -> Filename {
    let mut name = Filename::new();
    // 20 characters for every device number up to 999.
    let written = write!(
        name,
        "FED{:03}_{:02}{:02}{:02}_{:02}.CSV",
        device_number,
        date.month(),
        date.day(),
        date.year().rem_euclid(100),
        seq
    );
    debug_assert!(written.is_ok(), "session filename truncated: {name}");
    name
}

// ---------------------------------------------------------------------------
// SessionRecorder
// ---------------------------------------------------------------------------

pub struct SessionRecorder<S> {
    store: S,
    filename: Filename,
    records: u32,
}

impl<S: LogStore> SessionRecorder<S> {
    /// Create the session file under the smallest unused sequence number
    /// for today and write the header.  The last sequence is reused if
    /// every name is taken.
    pub fn open(mut store: S, device_number: u16, date: NaiveDate) -> Result<Self, StorageError> {
        let filename = (0..=MAX_SEQUENCE)
            .map(|seq| session_filename(device_number, date, seq))
            .find(|name| !store.exists(name))
            .unwrap_or_else(|| session_filename(device_number, date, MAX_SEQUENCE));

        store.create(&filename)?;
        store.append_line(HEADER)?;
        info!("session log: {}", filename);

        Ok(Self {
            store,
            filename,
            records: 0,
        })
    }

    /// Append one row and flush it.
    pub fn record(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        let line = record.to_line().map_err(|_| StorageError::Malformed)?;
        self.store.append_line(&line)?;
        self.records += 1;
        debug!("record #{}: {}", self.records, line);
        Ok(())
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Rows appended this session, header excluded.
    pub fn records_written(&self) -> u32 {
        self.records
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{DeviceIdentity, TimedWindow};
    use crate::schedule::ScheduleMode;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MemStore {
        files: BTreeMap<String, Vec<String>>,
        current: Option<String>,
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
            let name = self.current.as_ref().ok_or(StorageError::NotOpen)?;
            let file = self.files.get_mut(name).ok_or(StorageError::NotOpen)?;
            file.push(line.to_string());
            Ok(())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    fn timestamp() -> NaiveDateTime {
        date().and_hms_opt(9, 5, 3).unwrap()
    }

    #[test]
    fn retrieval_interval_formatting() {
        assert_eq!(RetrievalInterval::classify(45_000, 120).to_string(), "45");
        assert_eq!(RetrievalInterval::classify(121_000, 120).to_string(), "Timed_out");
        assert_eq!(RetrievalInterval::NotApplicable.to_string(), "nan");
        assert_eq!(RetrievalInterval::classify(2_500, 120).to_string(), "2.5");
        assert_eq!(RetrievalInterval::classify(1_234, 120).to_string(), "1.23");
    }

    #[test]
    fn timeout_boundary_is_exclusive() {
        assert_eq!(
            RetrievalInterval::classify(120_000, 120),
            RetrievalInterval::Seconds(120.0)
        );
        assert_eq!(RetrievalInterval::classify(120_001, 120), RetrievalInterval::TimedOut);
    }

    #[test]
    fn filename_pattern() {
        assert_eq!(session_filename(7, date(), 0).as_str(), "FED007_030726_00.CSV");
        assert_eq!(session_filename(700, date(), 12).as_str(), "FED700_030726_12.CSV");
    }

    #[test]
    fn widest_device_number_still_fits() {
        let name = session_filename(u16::MAX, date(), 99);
        assert_eq!(name.as_str(), "FED65535_030726_99.CSV");
    }

    #[test]
    fn open_picks_smallest_unused_sequence() {
        let mut store = MemStore::default();
        store.files.insert("FED003_030726_00.CSV".into(), vec![]);
        store.files.insert("FED003_030726_01.CSV".into(), vec![]);
        let rec = SessionRecorder::open(store, 3, date()).unwrap();
        assert_eq!(rec.filename(), "FED003_030726_02.CSV");
        assert_eq!(rec.store().files[rec.filename()], vec![HEADER.to_string()]);
    }

    #[test]
    fn open_reuses_last_sequence_when_full() {
        let mut store = MemStore::default();
        for seq in 0..=MAX_SEQUENCE {
            store.files.insert(session_filename(1, date(), seq).to_string(), vec![]);
        }
        let rec = SessionRecorder::open(store, 1, date()).unwrap();
        assert_eq!(rec.filename(), "FED001_030726_99.CSV");
    }

    #[test]
    fn poke_row_layout() {
        let identity = DeviceIdentity::new(12, ScheduleMode::FixedRatio(3), TimedWindow::default());
        let mut state = DeviceState::new(identity);
        state.left.count = 4;
        state.right.count = 1;
        state.motor.bursts = 2;
        state.motor.jam_clears = 1;

        let record = LogRecord::capture(
            &mut state,
            EventKind::Poke,
            timestamp(),
            3.9,
            RetrievalInterval::NotApplicable,
        );
        let expected = format!(
            "3/7/2026 9:05:03,{},12,3.90,12,FR3,Poke,Left,4,1,0,nan",
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(record.to_line().unwrap().as_str(), expected);
        assert_eq!(state.motor.take(), 0, "tally consumed by the record");
    }

    #[test]
    fn active_label_follows_gate_side() {
        let identity = DeviceIdentity::new(0, ScheduleMode::FixedRatioReversed, TimedWindow::default());
        let mut state = DeviceState::new(identity);
        state.left.count = 1;
        let record = LogRecord::capture(
            &mut state,
            EventKind::Poke,
            timestamp(),
            4.0,
            RetrievalInterval::NotApplicable,
        );
        assert_eq!(record.active_side, Side::Right);
        assert!(record.to_line().unwrap().contains(",Poke,Right,1,0,0,"));
    }

    #[test]
    fn record_appends_after_header() {
        let mut rec = SessionRecorder::open(MemStore::default(), 0, date()).unwrap();
        let mut state = DeviceState::new(DeviceIdentity::default());
        state.well.pellet_count = 1;
        let record = LogRecord::capture(
            &mut state,
            EventKind::Retrieval,
            timestamp(),
            4.1,
            RetrievalInterval::Seconds(45.0),
        );
        rec.record(&record).unwrap();
        let lines = &rec.store().files[rec.filename()];
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(",FED,Retrieval,Left,0,0,1,45"));
        assert_eq!(rec.records_written(), 1);
    }
}
