//! Mock board, storage and report sink for integration tests.
//!
//! Records every board call so tests can assert on the full history
//! without touching real ADC/watchdog registers.  `wait_for_reset`
//! unwinds with a [`Restarted`] payload, which tests catch with
//! `catch_unwind` to observe a fault-forced restart.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use faultwatch::app::events::BootEvent;
use faultwatch::app::ports::{
    ClockPort, HealthSensorPort, NvStoragePort, ReportSink, ResetCausePort, StorageError,
    WatchdogPort,
};
use faultwatch::config::{CursorPolicy, LOG_CAPACITY};
use faultwatch::diagnostics::layout_len;

// ── Board call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardCall {
    ReadSensor,
    ReadBattery,
    ReadResetCause,
    Arm(u32),
    Acknowledge,
    ForceRestart,
    Delay(u32),
}

/// Unwind payload of [`MockBoard::wait_for_reset`].
#[derive(Debug)]
pub struct Restarted;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub calls: Vec<BoardCall>,
    /// Returned by `read_sensor` once `sensor_script` is exhausted.
    pub sensor: i16,
    /// Returned by `read_battery` once `battery_script` is exhausted.
    pub battery: i16,
    pub sensor_script: VecDeque<i16>,
    pub battery_script: VecDeque<i16>,
    /// Current clock value (ms).  Delays advance it.
    pub now_ms: u32,
    /// Clock advance applied on every sensor read, to fake a slow ADC.
    pub ms_per_sensor_read: u32,
    /// Clock advance applied on every battery read.
    pub ms_per_battery_read: u32,
    reset_bits: Option<u8>,
}

#[allow(dead_code)]
impl MockBoard {
    /// Healthy mid-range readings, power-on reset.
    pub fn new() -> Self {
        Self::with_reset_bits(0b0001)
    }

    pub fn with_reset_bits(bits: u8) -> Self {
        Self {
            calls: Vec::new(),
            sensor: 512,
            battery: 700,
            sensor_script: VecDeque::new(),
            battery_script: VecDeque::new(),
            now_ms: 0,
            ms_per_sensor_read: 0,
            ms_per_battery_read: 0,
            reset_bits: Some(bits),
        }
    }

    pub fn count(&self, call: BoardCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn restarted(&self) -> bool {
        self.calls.contains(&BoardCall::ForceRestart)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSensorPort for MockBoard {
    fn read_sensor(&mut self) -> i16 {
        self.calls.push(BoardCall::ReadSensor);
        self.now_ms = self.now_ms.wrapping_add(self.ms_per_sensor_read);
        self.sensor_script.pop_front().unwrap_or(self.sensor)
    }

    fn read_battery(&mut self) -> i16 {
        self.calls.push(BoardCall::ReadBattery);
        self.now_ms = self.now_ms.wrapping_add(self.ms_per_battery_read);
        self.battery_script.pop_front().unwrap_or(self.battery)
    }
}

impl ClockPort for MockBoard {
    fn elapsed_millis(&self) -> u32 {
        self.now_ms
    }
}

impl WatchdogPort for MockBoard {
    fn arm(&mut self, timeout_ms: u32) {
        self.calls.push(BoardCall::Arm(timeout_ms));
    }

    fn acknowledge(&mut self) {
        self.calls.push(BoardCall::Acknowledge);
    }

    fn force_restart_now(&mut self) {
        self.calls.push(BoardCall::ForceRestart);
    }

    fn wait_for_reset(&mut self) -> ! {
        std::panic::panic_any(Restarted)
    }
}

impl ResetCausePort for MockBoard {
    fn read_and_clear(&mut self) -> u8 {
        self.calls.push(BoardCall::ReadResetCause);
        self.reset_bits.take().unwrap_or(0)
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ms = self.now_ms.wrapping_add(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls.push(BoardCall::Delay(ms));
        self.now_ms = self.now_ms.wrapping_add(ms);
    }
}

// ── MockStorage ───────────────────────────────────────────────

/// EEPROM stand-in.  Survives "restarts" by being moved into the next boot.
pub struct MockStorage {
    pub bytes: Vec<u8>,
    pub fail_writes: bool,
    /// Reject only writes starting at this offset.
    pub fail_at: Option<usize>,
    pub writes: usize,
}

#[allow(dead_code)]
impl MockStorage {
    /// Zeroed, sized for the default ring with a persisted cursor.
    pub fn new() -> Self {
        Self::sized(layout_len(LOG_CAPACITY, CursorPolicy::Persisted))
    }

    pub fn sized(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
            fail_writes: false,
            fail_at: None,
            writes: 0,
        }
    }

    /// Factory-fresh flash/EEPROM reads all-ones.
    pub fn erased() -> Self {
        let mut s = Self::new();
        s.bytes.fill(0xFF);
        s
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl NvStoragePort for MockStorage {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .bytes
            .get(offset..offset + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes || self.fail_at == Some(offset) {
            return Err(StorageError::IoError);
        }
        let dst = self
            .bytes
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<BootEvent>,
}

impl ReportSink for RecordingSink {
    fn emit(&mut self, event: &BootEvent) {
        self.events.push(event.clone());
    }
}
