//! One-shot hardware peripheral initialization.
//!
//! Configures the battery ADC channel, the three beam inputs, the motor
//! and signal outputs, and the LEDC buzzer timer using raw ESP-IDF sys
//! calls.  Called once from `main()` before the control loop starts.
//!
//! Host builds keep a simulated pin table instead, so drivers and the
//! hardware adapter can be exercised without a board.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC buzzer config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("peripheral initialisation failed")
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the init path or the main-loop ADC
/// read path.  `init_adc()` completes before the control loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), pins::BATTERY_ADC_CHANNEL, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 configured (CH{}=battery)", pins::BATTERY_ADC_CHANNEL);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> u16 {
    sim::ADC_RAW.load(core::sync::atomic::Ordering::Relaxed)
}

// ── GPIO Inputs ───────────────────────────────────────────────

/// The three active-low beam-break inputs.
pub const BEAM_INPUTS: [i32; 3] = [
    pins::PELLET_WELL_GPIO,
    pins::LEFT_POKE_GPIO,
    pins::RIGHT_POKE_GPIO,
];

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for &pin in &BEAM_INPUTS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: beam inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured pin; safe from main and ISR context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim::level(pin)
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let [a, b, c, d] = pins::MOTOR_COIL_GPIOS;
    let output_pins = [
        pins::MOTOR_ENABLE_GPIO,
        a,
        b,
        c,
        d,
        pins::BNC_OUT_GPIO,
        pins::GREEN_LED_GPIO,
        pins::DISPLAY_CS_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (motor de-energised)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to a pin configured in
    // init_gpio_outputs(). Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim::set_level(pin, high);
}

// ── LEDC (buzzer) ─────────────────────────────────────────────

pub const LEDC_CH_BUZZER: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: pins::BUZZER_PWM_RESOLUTION_BITS,
        freq_hz: 4_000,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: single main-task context via init_peripherals().
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_BUZZER,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::BUZZER_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (buzzer=CH0)");
    Ok(())
}

/// Drive the buzzer with a square wave at `freq_hz`; 0 silences it.
#[cfg(target_os = "espidf")]
pub fn buzzer_set(freq_hz: u32) {
    let half_duty = 1u32 << (pins::BUZZER_PWM_RESOLUTION_BITS - 1);
    // SAFETY: timer 0 and channel 0 were configured in init_ledc(); duty
    // writes come from the main loop or the buzzer's one-shot timer, which
    // only ever writes zero.
    unsafe {
        if freq_hz > 0 {
            ledc_set_freq(ledc_mode_t_LEDC_LOW_SPEED_MODE, ledc_timer_t_LEDC_TIMER_0, freq_hz);
        }
        ledc_set_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            LEDC_CH_BUZZER,
            if freq_hz > 0 { half_duty } else { 0 },
        );
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_BUZZER);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn buzzer_set(freq_hz: u32) {
    sim::BUZZER_HZ.store(freq_hz, core::sync::atomic::Ordering::Relaxed);
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pellet_well_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: register read; safe in ISR context.
    let low = unsafe { gpio_get_level(pins::PELLET_WELL_GPIO) } == 0;
    crate::events::pellet_well_isr(low);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn left_poke_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: register read; safe in ISR context.
    let low = unsafe { gpio_get_level(pins::LEFT_POKE_GPIO) } == 0;
    crate::events::left_poke_isr(low);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn right_poke_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: register read; safe in ISR context.
    let low = unsafe { gpio_get_level(pins::RIGHT_POKE_GPIO) } == 0;
    crate::events::right_poke_isr(low);
}

/// Install the per-pin GPIO ISR service and register the beam handlers.
/// Call after init_peripherals() and before the control loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // The handlers are static functions that only latch atomic flags.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        let handlers: [(i32, unsafe extern "C" fn(*mut core::ffi::c_void)); 3] = [
            (pins::PELLET_WELL_GPIO, pellet_well_gpio_isr),
            (pins::LEFT_POKE_GPIO, left_poke_gpio_isr),
            (pins::RIGHT_POKE_GPIO, right_poke_gpio_isr),
        ];
        for (pin, handler) in handlers {
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_ANYEDGE);
            let ret = gpio_isr_handler_add(pin, Some(handler), core::ptr::null_mut());
            if ret != ESP_OK {
                return Err(HwInitError::IsrInstallFailed(ret));
            }
            gpio_intr_enable(pin);
        }

        info!("hw_init: ISR service installed (pellet well, left poke, right poke)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

// ── Simulated pins (host) ─────────────────────────────────────

/// Host-side pin table.  Inputs idle HIGH like the real pull-ups.
#[cfg(not(target_os = "espidf"))]
pub mod sim {
    use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

    const PIN_COUNT: usize = 49;

    static LEVELS: [AtomicBool; PIN_COUNT] = [const { AtomicBool::new(true) }; PIN_COUNT];
    pub(super) static ADC_RAW: AtomicU16 = AtomicU16::new(2_480);
    pub(super) static BUZZER_HZ: AtomicU32 = AtomicU32::new(0);

    pub fn level(pin: i32) -> bool {
        LEVELS
            .get(pin as usize)
            .is_none_or(|l| l.load(Ordering::Relaxed))
    }

    pub fn set_level(pin: i32, high: bool) {
        if let Some(l) = LEVELS.get(pin as usize) {
            l.store(high, Ordering::Relaxed);
        }
    }

    pub fn set_adc_raw(raw: u16) {
        ADC_RAW.store(raw, Ordering::Relaxed);
    }

    pub fn buzzer_hz() -> u32 {
        BUZZER_HZ.load(Ordering::Relaxed)
    }
}
