//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one tagged line per application
//! event to the ESP-IDF logger (UART / USB-CDC in production).  Status
//! snapshots go out as a single JSON object so a host script can follow
//! a session live without the SD card.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug)]
pub struct LogEventSink {
    status_lines: bool,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { status_lines: true }
    }

    /// Suppress the per-cycle `STATUS` line.
    pub fn quiet() -> Self {
        Self { status_lines: false }
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { device_number, mode } => {
                info!(
                    "START | device={:03} | mode={}",
                    device_number,
                    mode.session_label(0)
                );
            }
            AppEvent::Poke { side, count, active } => {
                info!(
                    "POKE | side={} | count={} | {}",
                    side.label(),
                    count,
                    if *active { "active" } else { "inactive" }
                );
            }
            AppEvent::RewardEarned { side, action } => {
                info!("REWARD | side={} | action={:?}", side.label(), action);
            }
            AppEvent::Dispensing => {
                info!("MOTOR | dispensing");
            }
            AppEvent::JamRecovery { strategy, burst } => {
                info!("JAM | strategy={:?} | burst={}", strategy, burst);
            }
            AppEvent::PelletDelivered { pellet_count, bursts } => {
                info!("PELLET | count={} | bursts={}", pellet_count, bursts);
            }
            AppEvent::PelletRetrieved { interval } => {
                info!("RETRIEVAL | interval={}", interval);
            }
            AppEvent::StimulusDelivered { side } => {
                info!("STIM | side={}", side.label());
            }
            AppEvent::DispenseFault(fault) => {
                warn!("FAULT | {}", fault);
            }
            AppEvent::RecordFailed(e) => {
                warn!("SD | record not written: {}", e);
            }
            AppEvent::ResetRequested => {
                info!("RESET | both pokes held");
            }
            AppEvent::Status(snapshot) => {
                if !self.status_lines {
                    return;
                }
                match serde_json::to_string(snapshot) {
                    Ok(json) => info!("STATUS | {}", json),
                    Err(e) => warn!("STATUS | serialisation failed: {}", e),
                }
            }
        }
    }
}
