//! Fault recorder: capture, persist, restart.
//!
//! [`FaultRecorder::raise`] is the single exit from a running system.
//! It never returns: once called, the only way forward is the hardware
//! restart it schedules.
//!
//! ```text
//!  raise(kind)
//!    │ 1. snapshot clock + fresh sensor/battery reads
//!    │ 2. CrashStore::append
//!    │ 3. settle delay
//!    │ 4. watchdog.force_restart_now()
//!    ▼ 5. watchdog.wait_for_reset()  ── hardware restart ──▶ boot
//! ```

use log::{error, info};

use crate::app::ports::{ClockPort, HealthSensorPort, NvStoragePort, WatchdogPort};
use crate::config::LOG_CAPACITY;
use crate::diagnostics::{CrashStore, FaultRecord};
use crate::error::FaultKind;
use crate::reset_cause::ResetCause;
use embedded_hal::delay::DelayNs;

/// Owns the crash store and the boot-time reset cause stamped on every record.
pub struct FaultRecorder<N: NvStoragePort, const SLOTS: usize = LOG_CAPACITY> {
    store: CrashStore<N, SLOTS>,
    boot_cause: ResetCause,
    settle_delay_ms: u32,
}

impl<N: NvStoragePort, const SLOTS: usize> FaultRecorder<N, SLOTS> {
    pub fn new(store: CrashStore<N, SLOTS>, boot_cause: ResetCause, settle_delay_ms: u32) -> Self {
        Self {
            store,
            boot_cause,
            settle_delay_ms,
        }
    }

    /// Build the record for a fault raised now.
    ///
    /// Every field is assigned here, before anything touches storage.
    pub fn capture(
        &self,
        kind: FaultKind,
        board: &mut (impl HealthSensorPort + ClockPort),
        last_loop_start_ms: u32,
    ) -> FaultRecord {
        let now = board.elapsed_millis();
        let sensor = board.read_sensor();
        let battery = board.read_battery();
        FaultRecord::at(kind, self.boot_cause, now, last_loop_start_ms, sensor, battery)
    }

    /// Record `kind` and restart the device.  Never returns.
    ///
    /// A failed append is logged and the restart goes ahead anyway: the
    /// device is in a state software no longer trusts.
    pub fn raise<B>(&mut self, kind: FaultKind, board: &mut B, last_loop_start_ms: u32) -> !
    where
        B: HealthSensorPort + ClockPort + WatchdogPort + DelayNs,
    {
        let record = self.capture(kind, board, last_loop_start_ms);
        error!(
            "FAULT | {} (code {}) | uptime={}s sensor={} battery={} loop={}ms",
            kind,
            kind.code(),
            record.uptime_secs,
            record.sensor_value,
            record.battery_level,
            record.loop_duration_ms,
        );

        match self.store.append(&record) {
            Ok(slot) => info!("FAULT | recorded in slot {}", slot),
            Err(e) => error!("FAULT | {}: record lost ({})", FaultKind::StorageFault, e),
        }

        board.delay_ms(self.settle_delay_ms);

        info!("FAULT | halting, forced restart scheduled");
        board.force_restart_now();
        board.wait_for_reset()
    }

    pub fn store(&self) -> &CrashStore<N, SLOTS> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CrashStore<N, SLOTS> {
        &mut self.store
    }

    pub fn boot_cause(&self) -> ResetCause {
        self.boot_cause
    }

    pub fn into_store(self) -> CrashStore<N, SLOTS> {
        self.store
    }
}
