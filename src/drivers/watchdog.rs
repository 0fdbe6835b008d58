//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API.  The runtime arms it once at boot and
//! acknowledges it at the top of every loop iteration.  The fault recorder
//! uses [`Watchdog::force_restart_now`] to turn it into a restart trigger:
//! the timeout is reprogrammed to its minimum and never fed again.
//!
//! On host builds the same state machine runs against `std::time::Instant`.

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::app::ports::WatchdogPort;

/// Shortest timeout the TWDT accepts (milliseconds).
pub const MIN_TIMEOUT_MS: u32 = 1;

pub struct Watchdog {
    timeout_ms: Option<u32>,
    restart_scheduled: bool,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    last_ack: std::time::Instant,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Unarmed watchdog.  Nothing is programmed until [`WatchdogPort::arm`].
    pub fn new() -> Self {
        Self {
            timeout_ms: None,
            restart_scheduled: false,
            #[cfg(target_os = "espidf")]
            subscribed: false,
            #[cfg(not(target_os = "espidf"))]
            last_ack: std::time::Instant::now(),
        }
    }

    /// Currently programmed timeout, if armed.
    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    /// True once [`WatchdogPort::force_restart_now`] has run.
    pub fn restart_scheduled(&self) -> bool {
        self.restart_scheduled
    }

    #[cfg(target_os = "espidf")]
    fn program(&mut self, timeout_ms: u32) {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: TWDT calls are made from the single main task only.
        unsafe {
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK as esp_err_t {
                warn!("Watchdog: reconfigure returned {}", ret);
            }

            if !self.subscribed {
                let ret = esp_task_wdt_add(core::ptr::null_mut());
                self.subscribed = ret == ESP_OK as esp_err_t;
                if !self.subscribed {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }
            }
        }
        self.timeout_ms = Some(timeout_ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn program(&mut self, timeout_ms: u32) {
        self.timeout_ms = Some(timeout_ms);
        self.last_ack = std::time::Instant::now();
    }

    /// Simulation: whether the programmed timeout has run out.
    #[cfg(not(target_os = "espidf"))]
    pub fn expired(&self) -> bool {
        self.timeout_ms.is_some_and(|t| {
            self.last_ack.elapsed() >= std::time::Duration::from_millis(u64::from(t))
        })
    }
}

impl WatchdogPort for Watchdog {
    fn arm(&mut self, timeout_ms: u32) {
        self.program(timeout_ms);
        info!("Watchdog: armed ({}ms timeout, restart on expiry)", timeout_ms);
    }

    fn acknowledge(&mut self) {
        if self.restart_scheduled {
            // Feeding now would cancel the restart the recorder asked for.
            return;
        }
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: subscribed task feeding its own watchdog.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.last_ack = std::time::Instant::now();
        }
    }

    fn force_restart_now(&mut self) {
        warn!("Watchdog: forcing restart ({}ms)", MIN_TIMEOUT_MS);
        self.program(MIN_TIMEOUT_MS);
        self.restart_scheduled = true;
    }

    #[cfg(target_os = "espidf")]
    fn wait_for_reset(&mut self) -> ! {
        loop {
            // Yield instead of spinning so the idle task keeps running
            // while the TWDT counts down.
            std::thread::sleep(core::time::Duration::from_millis(10));
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn wait_for_reset(&mut self) -> ! {
        while !self.expired() {
            std::thread::sleep(core::time::Duration::from_millis(1));
        }
        warn!("Watchdog(sim): timeout expired, resetting");
        std::process::abort()
    }
}
