//! Cooperative health scheduler.
//!
//! Runs the health checks once per loop iteration, in the fixed order of
//! [`HealthCheck::ORDER`].  Not preemptive, not priority-based: a pass is
//! a straight-line walk over the checks on the caller's stack.
//!
//! ```text
//!  loop ──▶ begin_loop(now) ──▶ run_pass
//!                                 │
//!             ┌───────────────────┼───────────────────┐
//!             ▼                   ▼                   ▼
//!      sensor validity ──ok──▶ voltage floor ──ok──▶ timing ──ok──▶ return
//!             │                   │                   │
//!             └──── fault ────────┴──── fault ────────┴──▶ Err(kind) to the runtime
//! ```
//!
//! The first failing check is authoritative.  Later checks in the same
//! pass do not run, and do not even sample their inputs.  The runtime
//! turns the returned fault into a halt through
//! [`FaultRecorder::raise`](crate::recorder::FaultRecorder::raise).

use log::{info, warn};

use crate::app::ports::{ClockPort, HealthSensorPort};
use crate::config::RuntimeConfig;
use crate::error::FaultKind;
use crate::safety::{HealthCheck, HealthLimits};

// ═══════════════════════════════════════════════════════════════
//  Scheduler context
// ═══════════════════════════════════════════════════════════════

/// Timestamps the checks measure against, all on the board clock.
///
/// Written only by the scheduler: once per loop for `last_loop_start_ms`,
/// once per valid sensor reading for `last_sensor_update_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerContext {
    pub boot_ms: u32,
    pub last_loop_start_ms: u32,
    pub last_sensor_update_ms: u32,
}

impl SchedulerContext {
    /// All timestamps start at `now_ms`.
    pub fn new(now_ms: u32) -> Self {
        Self {
            boot_ms: now_ms,
            last_loop_start_ms: now_ms,
            last_sensor_update_ms: now_ms,
        }
    }

    /// Milliseconds since the monitor started.
    pub fn uptime_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.boot_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct HealthScheduler {
    limits: HealthLimits,
    ctx: SchedulerContext,
    /// Completed passes since boot.
    passes: u64,
}

impl HealthScheduler {
    pub fn new(config: &RuntimeConfig, now_ms: u32) -> Self {
        info!(
            "HealthScheduler: sensor {}..={}, floor {}, sensor timeout {}ms, loop budget {}ms",
            config.sensor_min,
            config.sensor_max,
            config.voltage_floor,
            config.sensor_timeout_ms,
            config.loop_budget_ms
        );
        Self {
            limits: HealthLimits::new(config),
            ctx: SchedulerContext::new(now_ms),
            passes: 0,
        }
    }

    /// Mark the start of a loop iteration.
    pub fn begin_loop(&mut self, now_ms: u32) {
        self.ctx.last_loop_start_ms = now_ms;
    }

    /// Run every check in order and stop at the first fault.
    pub fn evaluate(
        &mut self,
        board: &mut (impl HealthSensorPort + ClockPort),
    ) -> Result<(), FaultKind> {
        for check in HealthCheck::ORDER {
            self.run_check(check, board)?;
        }
        Ok(())
    }

    /// One scheduler pass.  A healthy pass is counted; a failed one is
    /// logged and its fault returned for the caller to raise.
    pub fn run_pass(
        &mut self,
        board: &mut (impl HealthSensorPort + ClockPort),
    ) -> Result<(), FaultKind> {
        if let Err(kind) = self.evaluate(board) {
            warn!("HealthScheduler: pass {} failed: {}", self.passes + 1, kind);
            return Err(kind);
        }
        self.passes += 1;
        Ok(())
    }

    pub fn context(&self) -> &SchedulerContext {
        &self.ctx
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    // ── Internal ──────────────────────────────────────────────────

    fn run_check(
        &mut self,
        check: HealthCheck,
        board: &mut (impl HealthSensorPort + ClockPort),
    ) -> Result<(), FaultKind> {
        match check {
            HealthCheck::SensorValidity => {
                let value = board.read_sensor();
                self.limits.check_sensor(value)?;
                self.ctx.last_sensor_update_ms = board.elapsed_millis();
                Ok(())
            }
            HealthCheck::VoltageFloor => self.limits.check_voltage(board.read_battery()),
            HealthCheck::Timing => {
                let now = board.elapsed_millis();
                self.limits.check_timing(
                    now.wrapping_sub(self.ctx.last_sensor_update_ms),
                    now.wrapping_sub(self.ctx.last_loop_start_ms),
                )
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
