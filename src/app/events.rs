//! Outbound boot-report events.
//!
//! The [`BootReporter`](crate::boot::BootReporter) emits these through the
//! [`ReportSink`](super::ports::ReportSink) port.  Adapters on the other
//! side decide how they look (serial log lines, a test recorder).

use crate::diagnostics::FaultRecord;
use crate::error::FaultKind;
use crate::reset_cause::ResetCause;

/// Structured events emitted while replaying the crash log at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootEvent {
    /// Replay started.  Carries the reset cause captured for this boot and
    /// the fault it implies (a watchdog reset means `WatchdogTimeout`).
    Banner {
        reset_cause: ResetCause,
        implied_fault: Option<FaultKind>,
        populated: usize,
        capacity: usize,
    },

    /// One physical slot of the crash ring, populated or not.
    Record { index: usize, record: FaultRecord },

    /// Replay done; the monitor is armed and entering its loop.
    Initialized,
}
