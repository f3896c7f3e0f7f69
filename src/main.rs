//! FED3 firmware main entry point.
//!
//! Hexagonal architecture with interrupt-driven wake-ups and light sleep
//! between control cycles.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   StatusScreen   NvsAdapter│
//! │  (Sensor+Motor+Stimulus)(EventSink)    (EventSink)    (Config)  │
//! │  SdCard (LogStore + SettingsStore)     RtcClock (ClockPort)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            FeederService (pure logic)                  │    │
//! │  │  Schedule gate · Dispense FSM · SessionRecorder        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventCapture (ISR flags) · PowerManager (light sleep)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::rmt::TxRmtDriver;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::sd::spi::SdSpiHostDriver;
use esp_idf_hal::sd::{SdCardConfiguration, SdCardDriver};
use esp_idf_hal::spi::config::{BitOrder, Config as SpiConfig, DriverConfig};
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver};
use esp_idf_hal::units::FromValueType;
use esp_idf_svc::io::vfs::MountedFatfs;

use fed3::adapters::display::StatusScreen;
use fed3::adapters::hardware::{HardwareAdapter, SystemDelay};
use fed3::adapters::log_sink::LogEventSink;
use fed3::adapters::nvs::NvsAdapter;
use fed3::adapters::sd_card::{self, SdCard, MOUNT_POINT};
use fed3::adapters::time::RtcClock;
use fed3::app::ports::{ClockPort, ConfigPort, SensorPort, StorageError};
use fed3::app::service::FeederService;
use fed3::app::stimuli;
use fed3::config::FeederConfig;
use fed3::drivers::buzzer::Buzzer;
use fed3::drivers::memory_lcd::MemoryLcd;
use fed3::drivers::pixels::PixelStrip;
use fed3::drivers::signal_out::SignalOutputs;
use fed3::drivers::stepper::StepperDriver;
use fed3::drivers::watchdog::Watchdog;
use fed3::drivers::hw_init;
use fed3::error::Error;
use fed3::events::CAPTURE;
use fed3::menu::{MenuStep, SetupMenu};
use fed3::power::PowerManager;
use fed3::recorder::SessionRecorder;
use fed3::schedule::Side;
use fed3::sensors::SensorHub;

/// Flash the error's blink code forever.  The task watchdog is not armed
/// until the control loop starts.
fn halt(hw: &mut HardwareAdapter, err: Error) -> ! {
    let code = err.blink_code();
    loop {
        stimuli::fault_round(hw, code);
    }
}

fn restart() -> ! {
    info!("Restarting");
    // SAFETY: esp_restart never returns.
    unsafe { esp_idf_sys::esp_restart() }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FED3 v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise raw peripherals ─────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, halting", e);
        return Err(Error::from(e).into());
    }
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed: {}, running on level polling only", e);
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => nvs.load().unwrap_or_else(|e| {
            warn!("NVS config load failed ({}), using defaults", e);
            FeederConfig::default()
        }),
        Err(e) => {
            warn!("NVS init failed ({}), using defaults", e);
            FeederConfig::default()
        }
    };

    // ── 4. Driver-backed peripherals ──────────────────────────
    let p = Peripherals::take()?;

    let rmt = TxRmtDriver::new(
        p.rmt.channel0,
        p.pins.gpio9,
        &TransmitConfig::new().clock_divider(1),
    )?;

    // The bus is shared by the SD host and the display for the life of
    // the program.
    let spi: &'static SpiDriver<'static> = Box::leak(Box::new(SpiDriver::new(
        p.spi2,
        p.pins.gpio36,
        p.pins.gpio35,
        Some(p.pins.gpio37),
        &DriverConfig::default(),
    )?));

    let lcd_spi = SpiDeviceDriver::new(
        spi,
        Option::<AnyIOPin>::None,
        &SpiConfig::new()
            .baudrate(2.MHz().into())
            .bit_order(BitOrder::LsbFirst),
    )?;
    let mut screen = StatusScreen::new(MemoryLcd::new(lcd_spi));

    let mut hw = HardwareAdapter::new(
        SensorHub::new(),
        StepperDriver::new(config.step_delay_us()),
        PixelStrip::new(rmt),
        Buzzer::new(),
        SignalOutputs::new(),
        RtcClock::new(),
    );
    stimuli::color_wipe(&mut hw, stimuli::OFF, 0, false);

    // ── 5. SD card ────────────────────────────────────────────
    let mounted = SdSpiHostDriver::new(
        spi,
        Some(p.pins.gpio38),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        None,
    )
    .and_then(|host| SdCardDriver::new_spi(host, &SdCardConfiguration::new()))
    .and_then(|card| Fatfs::new_sdcard(0, card))
    .and_then(|fs| MountedFatfs::mount(fs, MOUNT_POINT, 4));
    let _fatfs = match mounted {
        Ok(m) => m,
        Err(e) => {
            error!("SD mount failed: {}", e);
            screen.show_storage_fault();
            halt(&mut hw, Error::Storage(StorageError::Unavailable));
        }
    };
    let mut sd = match SdCard::open(MOUNT_POINT) {
        Ok(sd) => sd,
        Err(e) => {
            error!("SD card unusable: {}", e);
            screen.show_storage_fault();
            halt(&mut hw, e.into());
        }
    };
    let identity = sd_card::load_identity(&sd);
    info!(
        "Identity: device {:03}, mode {}",
        identity.device_number, identity.mode
    );
    if !hw.clock_mut().is_set() {
        warn!("RTC has never been set; timestamps start at the epoch");
    }

    // ── 6. Setup menu ─────────────────────────────────────────
    let left = hw.poke_pressed(Side::Left);
    let right = hw.poke_pressed(Side::Right);
    if SetupMenu::wants_entry(left, right) {
        info!("Entering setup menu");
        let mut menu = SetupMenu::new(identity, hw.uptime_ms() as u32);
        screen.show_menu(&menu);
        let mut delay = SystemDelay;
        loop {
            let l = hw.poke_pressed(Side::Left);
            let r = hw.poke_pressed(Side::Right);
            match menu.tick(hw.uptime_ms() as u32, l, r) {
                MenuStep::Idle => {}
                MenuStep::Adjusted(feedback) => {
                    if let Some(fb) = feedback {
                        fb.play(&mut hw);
                    }
                    screen.show_menu(&menu);
                }
                MenuStep::Confirmed(chosen) => {
                    if let Err(e) = sd_card::save_identity(&mut sd, &chosen) {
                        error!("Saving settings failed: {}", e);
                        screen.show_storage_fault();
                        halt(&mut hw, e.into());
                    }
                    stimuli::color_wipe(&mut hw, stimuli::OFF, 0, false);
                    restart();
                }
            }
            embedded_hal::delay::DelayNs::delay_ms(&mut delay, 10);
        }
    }

    // ── 7. Session log ────────────────────────────────────────
    let today = hw.now().date();
    let mut recorder = match SessionRecorder::open(sd, identity.device_number, today) {
        Ok(r) => r,
        Err(e) => {
            error!("Session file could not be created: {}", e);
            screen.show_storage_fault();
            halt(&mut hw, e.into());
        }
    };
    info!("Logging to {}", recorder.filename());

    // ── 8. Application service ────────────────────────────────
    // SAFETY: esp_random reads the hardware RNG; always safe to call.
    let seed = u64::from(unsafe { esp_idf_sys::esp_random() });
    let mut service = FeederService::new(identity, config.clone(), seed);
    let mut sinks = (LogEventSink::new(), screen);
    service.start(&mut hw, &mut sinks);

    let watchdog = Watchdog::new(&config);
    let mut power = PowerManager::new(&config);
    let mut delay = SystemDelay;

    info!("System ready. Entering control loop.");

    // ── 9. Control loop ───────────────────────────────────────
    loop {
        let outcome = service.run_cycle(&CAPTURE, &mut hw, &mut recorder, &mut sinks);
        if outcome.reset_requested {
            restart();
        }
        watchdog.feed();
        power.wait(&CAPTURE, &mut delay);
    }
}
