//! Unified error types and the fault taxonomy.
//!
//! Two distinct families live here:
//!
//! - [`Error`]: ordinary fallible operations (storage setup, config) that
//!   the boot path can report and recover from.
//! - [`FaultKind`]: terminal faults.  Raising one always ends the current
//!   run through [`FaultRecorder::raise`](crate::recorder::FaultRecorder::raise);
//!   none of them is recoverable in-process.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible, non-terminal operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Non-volatile storage could not be read or written.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Fault taxonomy
// ---------------------------------------------------------------------------

/// Kind of fault captured in a [`FaultRecord`](crate::diagnostics::FaultRecord).
///
/// The discriminants are the on-storage error codes.  Variant order must
/// match the discriminants: postcard encodes enums by variant index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaultKind {
    /// Sentinel for an empty slot.  Never raised.
    #[default]
    None = 0,
    /// Hardware watchdog expired.  Only ever observed through the reset cause.
    WatchdogTimeout = 1,
    /// Supply rail below the configured floor.
    LowVoltage = 2,
    /// No valid sensor reading within the sensor timeout budget.
    SensorTimeout = 3,
    /// Sensor reading outside its valid range.
    InvalidSensor = 4,
    MemoryFault = 5,
    StorageFault = 6,
    CommunicationFault = 7,
    /// A loop iteration exceeded the loop time budget.
    LoopStall = 8,
    /// Unclassified device failure (e.g. a Rust panic).
    DeviceFault = 9,
}

impl FaultKind {
    /// Numeric error code as stored and reported.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode an error code.  Unknown codes yield `None`.
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::WatchdogTimeout,
            2 => Self::LowVoltage,
            3 => Self::SensorTimeout,
            4 => Self::InvalidSensor,
            5 => Self::MemoryFault,
            6 => Self::StorageFault,
            7 => Self::CommunicationFault,
            8 => Self::LoopStall,
            9 => Self::DeviceFault,
            _ => return None,
        })
    }

    /// True for every kind except the empty-slot sentinel.
    pub const fn is_fault(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::WatchdogTimeout => write!(f, "watchdog timeout"),
            Self::LowVoltage => write!(f, "low voltage"),
            Self::SensorTimeout => write!(f, "sensor timeout"),
            Self::InvalidSensor => write!(f, "invalid sensor reading"),
            Self::MemoryFault => write!(f, "memory fault"),
            Self::StorageFault => write!(f, "storage fault"),
            Self::CommunicationFault => write!(f, "communication fault"),
            Self::LoopStall => write!(f, "loop stall"),
            Self::DeviceFault => write!(f, "device fault"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
