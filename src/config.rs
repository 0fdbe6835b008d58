//! Runtime configuration parameters
//!
//! Health-check thresholds and timing budgets for the monitor.
//! Defaults are the reference board values; a stored copy in NVS
//! overrides them at startup (see [`ConfigPort`](crate::app::ports::ConfigPort)).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Number of slots in the persistent crash ring.
pub const LOG_CAPACITY: usize = 5;

/// What the crash store does with its write cursor across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorPolicy {
    /// The cursor is stored next to the ring and restored at boot, so new
    /// faults never overwrite records from before the last restart until
    /// the ring has genuinely wrapped.
    #[default]
    Persisted,
    /// The cursor starts at slot 0 on every boot and is never stored.
    ResetOnBoot,
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Timing ---
    /// Maximum duration of one loop iteration (milliseconds)
    pub loop_budget_ms: u32,
    /// Maximum age of the last valid sensor reading (milliseconds)
    pub sensor_timeout_ms: u32,

    // --- Thresholds ---
    /// Lowest acceptable battery reading (raw ADC counts)
    pub voltage_floor: i16,
    /// Lowest valid sensor reading (inclusive)
    pub sensor_min: i16,
    /// Highest valid sensor reading (inclusive)
    pub sensor_max: i16,

    // --- Watchdog ---
    /// Liveness timeout armed at startup (milliseconds)
    pub watchdog_timeout_ms: u32,
    /// Wait between persisting a fault record and forcing the restart (milliseconds)
    pub settle_delay_ms: u32,

    // --- Heartbeat ---
    /// Heartbeat LED on-time per loop iteration (milliseconds)
    pub heartbeat_on_ms: u32,
    /// Pause after the heartbeat pulse (milliseconds)
    pub heartbeat_off_ms: u32,

    // --- Crash log ---
    pub cursor_policy: CursorPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // Timing
            loop_budget_ms: 200,
            sensor_timeout_ms: 300,

            // Thresholds
            voltage_floor: 600,
            sensor_min: 0,
            sensor_max: 1023, // 10-bit ADC

            // Watchdog
            watchdog_timeout_ms: 2000,
            settle_delay_ms: 50,

            // Heartbeat
            heartbeat_on_ms: 20,
            heartbeat_off_ms: 50,

            cursor_policy: CursorPolicy::Persisted,
        }
    }
}

impl RuntimeConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_min > self.sensor_max {
            return Err(ConfigError::ValidationFailed(
                "sensor_min must be <= sensor_max",
            ));
        }
        if self.voltage_floor < 0 {
            return Err(ConfigError::ValidationFailed(
                "voltage_floor must be non-negative",
            ));
        }
        if !(10..=10_000).contains(&self.loop_budget_ms) {
            return Err(ConfigError::ValidationFailed(
                "loop_budget_ms must be 10–10000",
            ));
        }
        if !(10..=60_000).contains(&self.sensor_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "sensor_timeout_ms must be 10–60000",
            ));
        }
        if !(100..=60_000).contains(&self.watchdog_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must be 100–60000",
            ));
        }
        if self.settle_delay_ms > 1000 {
            return Err(ConfigError::ValidationFailed(
                "settle_delay_ms must be 0–1000",
            ));
        }
        // One iteration (heartbeat pulse + pause + checks) must fit well
        // inside the liveness timeout or the guard fires on a healthy loop.
        let iteration_ms = self
            .heartbeat_on_ms
            .saturating_add(self.heartbeat_off_ms)
            .saturating_add(self.loop_budget_ms);
        if iteration_ms >= self.watchdog_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "heartbeat + loop budget must be shorter than watchdog_timeout_ms",
            ));
        }
        Ok(())
    }
}
