//! Faultwatch firmware entry point.
//!
//! Hexagonal architecture around a single supervised loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspBoard                    LogReportSink   NvsAdapter        │
//! │  (Sensor+Clock+Watchdog      (ReportSink)    (ConfigPort)      │
//! │   +ResetCause+Delay)         HeartbeatLed    NvsRingStorage    │
//! │                              (OutputPin)     (NvStoragePort)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Runtime (pure logic)                      │    │
//! │  │  BootReporter · HealthScheduler · FaultRecorder        │    │
//! │  │  CrashStore (5-slot ring)                              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use log::{error, info, warn};

use faultwatch::adapters::hardware::EspBoard;
use faultwatch::adapters::log_sink::LogReportSink;
use faultwatch::adapters::nvs::{NvsAdapter, NvsRingStorage};
use faultwatch::adapters::time::Esp32TimeAdapter;
use faultwatch::app::ports::ConfigPort;
use faultwatch::app::service::Runtime;
use faultwatch::config::{LOG_CAPACITY, RuntimeConfig};
use faultwatch::diagnostics::{self, layout_len};
use faultwatch::drivers::{hw_init, status_led::HeartbeatLed, watchdog::Watchdog};
use faultwatch::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Faultwatch v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without ADC the health checks are meaningless: log and halt.
        // No watchdog is armed yet, so this needs a manual reset.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new()?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            RuntimeConfig::default()
        }
    };
    let policy = config.cursor_policy;

    // ── 4. Build adapters ─────────────────────────────────────
    let storage = NvsRingStorage::open(layout_len(LOG_CAPACITY, policy))?;
    let board = EspBoard::new(Esp32TimeAdapter::new(), Watchdog::new());
    let heartbeat = HeartbeatLed::new(pins::HEARTBEAT_LED_GPIO);
    let mut sink = LogReportSink::new();

    // ── 5. Boot: reset cause, crash replay, arm watchdog ──────
    let runtime: Runtime<_, _, _> = Runtime::boot(config, board, storage, heartbeat, &mut sink)?;
    diagnostics::install_panic_handler(runtime.reset_cause(), policy);

    // ── 6. Supervised loop ────────────────────────────────────
    runtime.run()
}
