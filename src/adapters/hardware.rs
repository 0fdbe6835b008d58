//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! [`EspBoard`] owns the clock and the watchdog driver and reads the ADC
//! through hw_init, exposing them as one [`Board`](crate::app::ports::Board).
//! This is the only module in the system that reads the reset-reason
//! register.  On non-espidf targets, the underlying drivers use cfg-gated
//! simulation stubs.

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::adapters::time::Esp32TimeAdapter;
use crate::app::ports::{ClockPort, HealthSensorPort, ResetCausePort, WatchdogPort};
use crate::drivers::hw_init;
use crate::drivers::watchdog::Watchdog;
use crate::pins;
use crate::reset_cause::{ResetCause, ResetKind};

/// Concrete adapter that combines all health hardware behind port traits.
pub struct EspBoard {
    clock: Esp32TimeAdapter,
    watchdog: Watchdog,
    reset_consumed: bool,
}

impl EspBoard {
    pub fn new(clock: Esp32TimeAdapter, watchdog: Watchdog) -> Self {
        Self {
            clock,
            watchdog,
            reset_consumed: false,
        }
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// One ADC1 conversion scaled to 10 bits; a failed conversion reads -1.
    pub fn read_scaled(channel: u32) -> i16 {
        match hw_init::adc1_read(channel) {
            Some(raw) => (raw >> pins::ADC_SCALE_SHIFT) as i16,
            None => {
                warn!("EspBoard: ADC1 CH{} read failed", channel);
                -1
            }
        }
    }
}

// ── HealthSensorPort ──────────────────────────────────────────

impl HealthSensorPort for EspBoard {
    fn read_sensor(&mut self) -> i16 {
        Self::read_scaled(pins::SENSOR_ADC_CHANNEL)
    }

    fn read_battery(&mut self) -> i16 {
        Self::read_scaled(pins::BATTERY_ADC_CHANNEL)
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl ClockPort for EspBoard {
    fn elapsed_millis(&self) -> u32 {
        self.clock.elapsed_millis()
    }
}

// ── WatchdogPort ──────────────────────────────────────────────

impl WatchdogPort for EspBoard {
    fn arm(&mut self, timeout_ms: u32) {
        self.watchdog.arm(timeout_ms);
    }

    fn acknowledge(&mut self) {
        self.watchdog.acknowledge();
    }

    fn force_restart_now(&mut self) {
        self.watchdog.force_restart_now();
    }

    fn wait_for_reset(&mut self) -> ! {
        self.watchdog.wait_for_reset()
    }
}

// ── ResetCausePort ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn hardware_reset_kind() -> ResetKind {
    use esp_idf_svc::sys::*;

    // SAFETY: plain register read.
    let reason = unsafe { esp_reset_reason() };
    #[allow(non_upper_case_globals)]
    match reason {
        esp_reset_reason_t_ESP_RST_POWERON => ResetKind::PowerOn,
        esp_reset_reason_t_ESP_RST_EXT => ResetKind::External,
        esp_reset_reason_t_ESP_RST_BROWNOUT => ResetKind::BrownOut,
        esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_WDT => ResetKind::Watchdog,
        other => {
            warn!("EspBoard: unmapped reset reason {}", other);
            ResetKind::Unknown
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn hardware_reset_kind() -> ResetKind {
    ResetKind::PowerOn
}

impl ResetCausePort for EspBoard {
    /// ESP-IDF latches the reason for the whole boot and offers no clear;
    /// the first read takes it, later reads see an empty register.
    fn read_and_clear(&mut self) -> u8 {
        if self.reset_consumed {
            return 0;
        }
        self.reset_consumed = true;
        ResetCause::from_kind(hardware_reset_kind()).bits()
    }
}

// ── DelayNs ───────────────────────────────────────────────────

impl DelayNs for EspBoard {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Ets::delay_us(ns.div_ceil(1_000));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        // Blocks the task, not the core: the idle task keeps running.
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
