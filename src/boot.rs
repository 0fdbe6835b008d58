//! Boot-time reporting.
//!
//! Runs once, before the scheduler starts: reads the reset cause (which
//! clears the hardware register) and replays every slot of the crash
//! ring to the operator, in physical slot order.

use log::{info, warn};

use crate::app::events::BootEvent;
use crate::app::ports::{NvStoragePort, ReportSink, ResetCausePort};
use crate::diagnostics::CrashStore;
use crate::reset_cause::ResetCause;

pub struct BootReporter;

impl BootReporter {
    /// Read and clear the reset-cause register.  Call exactly once per boot.
    pub fn capture_reset_cause(port: &mut impl ResetCausePort) -> ResetCause {
        let cause = ResetCause::from_bits(port.read_and_clear());
        info!("Boot: reset cause {}", cause);
        if let Some(fault) = cause.implied_fault() {
            warn!("Boot: previous run ended in {}", fault);
        }
        cause
    }

    /// Emit the banner and all `SLOTS` records.  Returns the number of
    /// populated slots.
    pub fn replay<N: NvStoragePort, const SLOTS: usize>(
        store: &CrashStore<N, SLOTS>,
        reset_cause: ResetCause,
        sink: &mut impl ReportSink,
    ) -> usize {
        let records = store.snapshot();
        let populated = records.iter().filter(|r| !r.is_empty()).count();
        sink.emit(&BootEvent::Banner {
            reset_cause,
            implied_fault: reset_cause.implied_fault(),
            populated,
            capacity: SLOTS,
        });
        for (index, record) in records.into_iter().enumerate() {
            sink.emit(&BootEvent::Record { index, record });
        }
        info!("Boot: replayed {} of {} crash slots", populated, SLOTS);
        populated
    }
}
