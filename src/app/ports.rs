//! Port traits: the hexagonal boundary between the monitor and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Runtime / HealthScheduler / FaultRecorder
//! ```
//!
//! Driven adapters (ADC, clock, watchdog, reset register, NVS, report
//! output) implement these traits.  The core consumes them via generics,
//! so none of the fault-handling logic touches hardware directly.

use embedded_hal::delay::DelayNs;

use crate::config::RuntimeConfig;

// ───────────────────────────────────────────────────────────────
// Health sensor port (driven adapter: hardware → monitor)
// ───────────────────────────────────────────────────────────────

/// Instantaneous readings the health checks evaluate.
///
/// Both reads must be non-blocking.  Adapters report a failed conversion
/// as an out-of-range value so that the validity check catches it.
pub trait HealthSensorPort {
    /// Raw sensor reading.
    fn read_sensor(&mut self) -> i16;

    /// Raw battery / supply rail reading.
    fn read_battery(&mut self) -> i16;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.  Reset only by a physical restart;
/// may wrap, so callers subtract with `wrapping_sub`.
pub trait ClockPort {
    fn elapsed_millis(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Watchdog port
// ───────────────────────────────────────────────────────────────

/// Liveness guard plus the deliberate-restart capability.
///
/// The two intents are separate methods: [`acknowledge`](Self::acknowledge)
/// keeps the device alive, [`force_restart_now`](Self::force_restart_now)
/// schedules a restart that nothing can cancel.
pub trait WatchdogPort {
    /// (Re)program the guard to restart the device unless acknowledged
    /// within `timeout_ms`.
    fn arm(&mut self, timeout_ms: u32);

    /// Restart the countdown.
    fn acknowledge(&mut self);

    /// Reprogram the guard to its shortest timeout and stop acknowledging.
    /// A restart follows within a few tens of milliseconds.
    fn force_restart_now(&mut self);

    /// Suspend forward progress until the hardware restarts the device.
    fn wait_for_reset(&mut self) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Reset cause port
// ───────────────────────────────────────────────────────────────

/// Read-once side channel to the hardware reset status register.
pub trait ResetCausePort {
    /// Return the raw reset-cause bits and clear the register.
    ///
    /// Bit layout is decoded only by [`ResetCause`](crate::reset_cause::ResetCause).
    fn read_and_clear(&mut self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Board bundle
// ───────────────────────────────────────────────────────────────

/// Everything the runtime needs from the board in one bound.
///
/// Passing the board as a single `&mut` avoids juggling several mutable
/// borrows of the same peripheral owner.  Blanket-implemented.
pub trait Board: HealthSensorPort + ClockPort + WatchdogPort + ResetCausePort + DelayNs {}

impl<T> Board for T where T: HealthSensorPort + ClockPort + WatchdogPort + ResetCausePort + DelayNs {}

// ───────────────────────────────────────────────────────────────
// Non-volatile storage port
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile storage (EEPROM, or an NVS blob image).
///
/// Writes are synchronous and durable once they return.
pub trait NvStoragePort {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Addressable size in bytes.
    fn capacity(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Report sink port (domain → operator)
// ───────────────────────────────────────────────────────────────

/// The boot replay emits structured [`BootEvent`](super::events::BootEvent)s
/// through this port.  Adapters decide how they are rendered.
pub trait ReportSink {
    fn emit(&mut self, event: &super::events::BootEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the runtime configuration.
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`RuntimeConfig::default()`] if nothing
    /// is stored.
    fn load(&self) -> Result<RuntimeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &RuntimeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`NvStoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Access outside `0..capacity()`.
    OutOfBounds,
    /// The driver reported a failed read or write.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl std::error::Error for StorageError {}
