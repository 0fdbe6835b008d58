//! Runtime service, the hexagonal core.
//!
//! [`Runtime`] owns the board, the heartbeat pin, the health scheduler
//! and the fault recorder.  It exposes the boot sequence and one loop
//! iteration; everything it touches flows through port traits, so the
//! whole lifecycle runs on the host against mock adapters.
//!
//! ```text
//!   Board ──▶ ┌─────────────────────────────┐ ──▶ ReportSink (boot only)
//!             │           Runtime           │
//!  NvStorage ◀│ HealthScheduler · Recorder  │──▶ heartbeat OutputPin
//!             └─────────────────────────────┘
//! ```
//!
//! Lifecycle: `Booting → Running → Halting → (hardware restart) → Booting`.
//! The runtime enters Halting when a pass fails, just before handing the
//! fault to [`FaultRecorder::raise`]; the restart ends it.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::events::BootEvent;
use crate::app::ports::{Board, NvStoragePort, ReportSink};
use crate::boot::BootReporter;
use crate::config::{LOG_CAPACITY, RuntimeConfig};
use crate::diagnostics::{self, CrashStore};
use crate::error::{FaultKind, Result};
use crate::recorder::FaultRecorder;
use crate::reset_cause::ResetCause;
use crate::scheduler::HealthScheduler;

/// Where the runtime is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Reset cause captured, crash log being replayed.
    Booting,
    /// Watchdog armed, health passes running.
    Running,
    /// A check failed; the fault is being recorded and a restart forced.
    Halting,
}

// ───────────────────────────────────────────────────────────────
// Runtime
// ───────────────────────────────────────────────────────────────

pub struct Runtime<B, N, L, const SLOTS: usize = LOG_CAPACITY>
where
    B: Board,
    N: NvStoragePort,
    L: OutputPin,
{
    board: B,
    heartbeat: L,
    scheduler: HealthScheduler,
    recorder: FaultRecorder<N, SLOTS>,
    config: RuntimeConfig,
    state: RuntimeState,
}

impl<B, N, L, const SLOTS: usize> Runtime<B, N, L, SLOTS>
where
    B: Board,
    N: NvStoragePort,
    L: OutputPin,
{
    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot sequence: capture the reset cause, replay the crash log to
    /// `sink`, initialise the scheduler context, arm the watchdog.
    ///
    /// The reset-cause register is consumed even if opening the crash
    /// store fails afterwards.
    pub fn boot(
        config: RuntimeConfig,
        mut board: B,
        storage: N,
        heartbeat: L,
        sink: &mut impl ReportSink,
    ) -> Result<Self> {
        info!("Runtime: {:?}", RuntimeState::Booting);
        let reset_cause = BootReporter::capture_reset_cause(&mut board);

        let store = CrashStore::<N, SLOTS>::open(storage, config.cursor_policy)?;
        BootReporter::replay(&store, reset_cause, sink);

        let recorder = FaultRecorder::new(store, reset_cause, config.settle_delay_ms);
        let scheduler = HealthScheduler::new(&config, board.elapsed_millis());

        board.arm(config.watchdog_timeout_ms);
        info!("Runtime: watchdog armed ({}ms)", config.watchdog_timeout_ms);

        sink.emit(&BootEvent::Initialized);

        let mut runtime = Self {
            board,
            heartbeat,
            scheduler,
            recorder,
            config,
            state: RuntimeState::Booting,
        };
        runtime.transition(RuntimeState::Running);
        Ok(runtime)
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One loop iteration: acknowledge → mark loop start → health pass →
    /// heartbeat.  Does not return if a health check fails.
    ///
    /// The acknowledgement comes first so that a stalled check, not the
    /// acknowledgement itself, is what the watchdog ends up catching.
    pub fn tick(&mut self) {
        self.board.acknowledge();

        let now = self.board.elapsed_millis();
        self.scheduler.begin_loop(now);
        diagnostics::note_loop_start(now);
        if let Err(kind) = self.scheduler.run_pass(&mut self.board) {
            self.halt(kind);
        }

        self.pulse_heartbeat();
    }

    /// Loop forever.  Leaves only through a fault-forced restart or a
    /// watchdog expiry.
    pub fn run(mut self) -> ! {
        loop {
            self.tick();
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn heartbeat(&self) -> &L {
        &self.heartbeat
    }

    pub fn scheduler(&self) -> &HealthScheduler {
        &self.scheduler
    }

    pub fn recorder(&self) -> &FaultRecorder<N, SLOTS> {
        &self.recorder
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn reset_cause(&self) -> ResetCause {
        self.recorder.boot_cause()
    }

    /// Tear down into the owned peripherals, e.g. to hand the storage to
    /// the next boot.
    pub fn into_parts(self) -> (B, N, L) {
        (
            self.board,
            self.recorder.into_store().into_storage(),
            self.heartbeat,
        )
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition(&mut self, to: RuntimeState) {
        if self.state != to {
            info!("Runtime: {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }

    fn halt(&mut self, kind: FaultKind) -> ! {
        warn!("Runtime: halting on {}", kind);
        self.transition(RuntimeState::Halting);
        let last_loop_start_ms = self.scheduler.context().last_loop_start_ms;
        self.recorder.raise(kind, &mut self.board, last_loop_start_ms)
    }

    fn pulse_heartbeat(&mut self) {
        // A heartbeat pin error is not a health fault; the next
        // iteration tries again.
        let _ = self.heartbeat.set_high();
        self.board.delay_ms(self.config.heartbeat_on_ms);
        let _ = self.heartbeat.set_low();
        self.board.delay_ms(self.config.heartbeat_off_ms);
    }
}
