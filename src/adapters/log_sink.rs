//! Log-based report sink adapter.
//!
//! Implements [`ReportSink`] by writing the boot replay to the ESP-IDF
//! logger (which goes to UART / USB-CDC in production).  Each populated
//! slot renders as a small block:
//!
//! ```text
//! === BOOT ===
//! Reset cause: WATCHDOG (0x08)
//! Previous run ended in: watchdog timeout (1)
//! Crash log: 3/5 slots populated
//! LOG #2
//!   Reset: WATCHDOG (0x08)
//!   Error: low voltage (2)
//!   Uptime: 41 sec
//!   Sensor: 512
//!   Battery ADC: 588
//!   Loop time: 14 ms
//! ```

use log::info;

use crate::app::events::BootEvent;
use crate::app::ports::ReportSink;

/// Adapter that logs every [`BootEvent`] to the serial console.
#[derive(Default)]
pub struct LogReportSink {
    /// Also print a line for never-written slots.
    pub show_empty: bool,
}

impl LogReportSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for LogReportSink {
    fn emit(&mut self, event: &BootEvent) {
        match event {
            BootEvent::Banner {
                reset_cause,
                implied_fault,
                populated,
                capacity,
            } => {
                info!("=== BOOT ===");
                info!("Reset cause: {}", reset_cause);
                if let Some(fault) = implied_fault {
                    info!("Previous run ended in: {} ({})", fault, fault.code());
                }
                info!("Crash log: {}/{} slots populated", populated, capacity);
            }
            BootEvent::Record { index, record } if record.is_empty() => {
                if self.show_empty {
                    info!("LOG #{}: empty", index);
                }
            }
            BootEvent::Record { index, record } => {
                info!("LOG #{}", index);
                info!("  Reset: {}", record.reset_cause);
                info!("  Error: {} ({})", record.error_code, record.error_code.code());
                info!("  Uptime: {} sec", record.uptime_secs);
                info!("  Sensor: {}", record.sensor_value);
                info!("  Battery ADC: {}", record.battery_level);
                info!("  Loop time: {} ms", record.loop_duration_ms);
            }
            BootEvent::Initialized => {
                info!("System initialized");
            }
        }
    }
}
