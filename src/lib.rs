//! Faultwatch: self-monitoring runtime for a small embedded device.
//!
//! A fixed loop evaluates sensor validity, supply voltage and timing
//! budgets.  The first failing check is recorded with a forensic snapshot
//! in a five-slot crash ring on non-volatile storage, then the watchdog
//! is forced to restart the device.  At the next boot the reset cause and
//! the whole ring are replayed to the operator.
//!
//! The pure-logic modules build and test on the host.  All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod boot;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod recorder;
pub mod reset_cause;
pub mod safety;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod pins;

pub use config::{CursorPolicy, LOG_CAPACITY, RuntimeConfig};
pub use diagnostics::{CrashStore, FaultRecord};
pub use error::{Error, FaultKind};
pub use recorder::FaultRecorder;
pub use reset_cause::{ResetCause, ResetKind};
