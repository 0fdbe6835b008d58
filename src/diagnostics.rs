//! Crash forensics: the fault record and its persistent ring.
//!
//! Stores up to [`LOG_CAPACITY`] fault records in a fixed-layout ring on
//! byte-addressable non-volatile storage.  Slot `i` lives at byte offset
//! `i × RECORD_SIZE`; each record is postcard-encoded and zero-padded to
//! the slot size, so a write never crosses into a neighbouring slot.
//!
//! ```text
//! offset 0      16     32     48     64     80  82
//!        ┌──────┬──────┬──────┬──────┬──────┬───┐
//!        │ s0   │ s1   │ s2   │ s3   │ s4   │cur│  cur = [cursor, !cursor]
//!        └──────┴──────┴──────┴──────┴──────┴───┘
//! ```
//!
//! The cursor cell is only present with [`CursorPolicy::Persisted`].
//! No other ordering metadata is stored: every slot stays readable on its
//! own even after an unplanned reset mid-write of a neighbour.
//!
//! A custom panic handler appends a [`FaultKind::DeviceFault`] record
//! before the panic aborts and the device resets.

use core::sync::atomic::{AtomicU32, Ordering};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{NvStoragePort, StorageError};
use crate::config::{CursorPolicy, LOG_CAPACITY};
use crate::error::FaultKind;
use crate::reset_cause::ResetCause;

/// Bytes reserved per ring slot.  Worst-case postcard encoding of a
/// [`FaultRecord`] is 1 + 1 + 5 + 3 + 3 + 3 = 16 bytes.
pub const RECORD_SIZE: usize = 16;

/// Bytes of the persisted cursor cell.
pub const CURSOR_CELL_SIZE: usize = 2;

/// Storage bytes needed for a ring of `slots` records under `policy`.
pub const fn layout_len(slots: usize, policy: CursorPolicy) -> usize {
    match policy {
        CursorPolicy::Persisted => slots * RECORD_SIZE + CURSOR_CELL_SIZE,
        CursorPolicy::ResetOnBoot => slots * RECORD_SIZE,
    }
}

/// One forensic snapshot, captured when a fault is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaultRecord {
    pub error_code: FaultKind,
    /// Cause of the restart that started the run in which the fault occurred.
    pub reset_cause: ResetCause,
    pub uptime_secs: u32,
    pub sensor_value: i16,
    pub battery_level: i16,
    /// Time spent in the loop iteration that raised the fault.
    pub loop_duration_ms: u16,
}

impl FaultRecord {
    /// Sentinel returned for slots that were never written.
    pub const EMPTY: Self = Self {
        error_code: FaultKind::None,
        reset_cause: ResetCause::from_bits(0),
        uptime_secs: 0,
        sensor_value: 0,
        battery_level: 0,
        loop_duration_ms: 0,
    };

    /// Assemble a record from readings taken at `now_ms` on the board clock.
    /// Loop durations past `u16::MAX` saturate.
    pub fn at(
        error_code: FaultKind,
        reset_cause: ResetCause,
        now_ms: u32,
        loop_start_ms: u32,
        sensor_value: i16,
        battery_level: i16,
    ) -> Self {
        let loop_ms = now_ms.wrapping_sub(loop_start_ms);
        Self {
            error_code,
            reset_cause,
            uptime_secs: now_ms / 1000,
            sensor_value,
            battery_level,
            loop_duration_ms: u16::try_from(loop_ms).unwrap_or(u16::MAX),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.error_code.is_fault()
    }

    fn encode(&self) -> Result<[u8; RECORD_SIZE], StorageError> {
        let mut slot = [0u8; RECORD_SIZE];
        postcard::to_slice(self, &mut slot).map_err(|_| StorageError::IoError)?;
        Ok(slot)
    }

    /// Decode a slot.  Anything unreadable (erased flash, a torn write,
    /// an unknown error code) reads as [`FaultRecord::EMPTY`].
    fn decode(slot: &[u8]) -> Self {
        match postcard::from_bytes::<FaultRecord>(slot) {
            Ok(record) if !record.is_empty() => record,
            _ => Self::EMPTY,
        }
    }
}

/// Fixed-capacity ring of fault records on non-volatile storage.
///
/// The store is the only writer of its storage region.  The cursor is
/// the next slot to overwrite.
pub struct CrashStore<N: NvStoragePort, const SLOTS: usize = LOG_CAPACITY> {
    storage: N,
    cursor: usize,
    policy: CursorPolicy,
}

impl<N: NvStoragePort, const SLOTS: usize> CrashStore<N, SLOTS> {
    /// Attach to `storage` and restore the cursor according to `policy`.
    ///
    /// Fails with [`StorageError::OutOfBounds`] if the storage is too small
    /// for the ring layout.
    pub fn open(storage: N, policy: CursorPolicy) -> Result<Self, StorageError> {
        const { assert!(SLOTS > 0 && SLOTS <= u8::MAX as usize, "ring must have 1–255 slots") };

        if storage.capacity() < layout_len(SLOTS, policy) {
            error!(
                "CrashStore: storage holds {} bytes, ring needs {}",
                storage.capacity(),
                layout_len(SLOTS, policy)
            );
            return Err(StorageError::OutOfBounds);
        }

        let cursor = match policy {
            CursorPolicy::Persisted => Self::load_cursor(&storage)?,
            CursorPolicy::ResetOnBoot => 0,
        };
        info!("CrashStore: {} slots, cursor at {} ({:?})", SLOTS, cursor, policy);

        Ok(Self {
            storage,
            cursor,
            policy,
        })
    }

    /// Write `record` into the slot under the cursor and advance the cursor.
    /// Returns the slot that was written.
    ///
    /// There is no retry: a failed write on a device about to restart is
    /// reported to the caller and that is all.
    ///
    /// Only the slot write decides the outcome.  Once the record is stored,
    /// a failed cursor-cell write is logged and the slot is still returned;
    /// the next boot then resumes at that slot.
    pub fn append(&mut self, record: &FaultRecord) -> Result<usize, StorageError> {
        let slot = self.cursor;
        let bytes = record.encode()?;
        self.storage.write(Self::slot_offset(slot), &bytes)?;

        self.cursor = (slot + 1) % SLOTS;
        if self.policy == CursorPolicy::Persisted {
            let cell = [self.cursor as u8, !(self.cursor as u8)];
            if let Err(e) = self.storage.write(Self::cursor_offset(), &cell) {
                warn!(
                    "CrashStore: record kept in slot {}, cursor cell not written ({})",
                    slot, e
                );
            }
        }
        Ok(slot)
    }

    /// Record last written at physical slot `index`, or the sentinel if the
    /// slot is empty, unreadable, or out of range.
    pub fn read_slot(&self, index: usize) -> FaultRecord {
        if index >= SLOTS {
            return FaultRecord::EMPTY;
        }
        let mut buf = [0u8; RECORD_SIZE];
        match self.storage.read(Self::slot_offset(index), &mut buf) {
            Ok(()) => FaultRecord::decode(&buf),
            Err(e) => {
                warn!("CrashStore: slot {} read failed ({})", index, e);
                FaultRecord::EMPTY
            }
        }
    }

    /// All slots in physical order `0..SLOTS`, populated or not.
    pub fn iter_all(&self) -> impl Iterator<Item = (usize, FaultRecord)> + '_ {
        (0..SLOTS).map(|i| (i, self.read_slot(i)))
    }

    /// Every slot read once into a fixed-capacity buffer, index = slot.
    pub fn snapshot(&self) -> heapless::Vec<FaultRecord, SLOTS> {
        (0..SLOTS).map(|i| self.read_slot(i)).collect()
    }

    /// Populated slots from oldest to newest, judged by the cursor.
    ///
    /// Only meaningful with [`CursorPolicy::Persisted`]; with
    /// `ResetOnBoot` the cursor restarts at 0 and the order is a guess.
    pub fn iter_chronological(&self) -> impl Iterator<Item = (usize, FaultRecord)> + '_ {
        (0..SLOTS)
            .map(|k| (self.cursor + k) % SLOTS)
            .map(|i| (i, self.read_slot(i)))
            .filter(|(_, r)| !r.is_empty())
    }

    /// Most recently appended record, if that slot is populated.
    pub fn latest(&self) -> Option<(usize, FaultRecord)> {
        let slot = (self.cursor + SLOTS - 1) % SLOTS;
        let record = self.read_slot(slot);
        (!record.is_empty()).then_some((slot, record))
    }

    /// Number of populated slots.
    pub fn count(&self) -> usize {
        self.iter_all().filter(|(_, r)| !r.is_empty()).count()
    }

    /// Erase every slot and reset the cursor.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let zero = [0u8; RECORD_SIZE];
        for i in 0..SLOTS {
            self.storage.write(Self::slot_offset(i), &zero)?;
        }
        self.cursor = 0;
        if self.policy == CursorPolicy::Persisted {
            self.storage.write(Self::cursor_offset(), &[0, 0xFF])?;
        }
        info!("CrashStore: cleared");
        Ok(())
    }

    /// Next slot to be overwritten.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub const fn capacity(&self) -> usize {
        SLOTS
    }

    pub fn storage(&self) -> &N {
        &self.storage
    }

    pub fn into_storage(self) -> N {
        self.storage
    }

    // ── Internal ──────────────────────────────────────────────────

    const fn slot_offset(index: usize) -> usize {
        index * RECORD_SIZE
    }

    const fn cursor_offset() -> usize {
        SLOTS * RECORD_SIZE
    }

    /// A cell that fails its complement check, or points past the ring,
    /// restores as cursor 0.
    fn load_cursor(storage: &N) -> Result<usize, StorageError> {
        let mut cell = [0u8; CURSOR_CELL_SIZE];
        storage.read(Self::cursor_offset(), &mut cell)?;
        let [cursor, check] = cell;
        if check == !cursor && (cursor as usize) < SLOTS {
            Ok(cursor as usize)
        } else {
            Ok(0)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Custom panic handler: writes a FaultRecord to NVS before reset
// ───────────────────────────────────────────────────────────────

/// Start of the current loop iteration, for the panic hook's loop timing.
static LOOP_START_MS: AtomicU32 = AtomicU32::new(0);

/// Publish the start of a loop iteration (board clock, ms).
pub fn note_loop_start(now_ms: u32) {
    LOOP_START_MS.store(now_ms, Ordering::Relaxed);
}

/// Start of the loop iteration last published by [`note_loop_start`].
pub fn last_loop_start() -> u32 {
    LOOP_START_MS.load(Ordering::Relaxed)
}

/// The [`FaultKind::DeviceFault`] record a panic at `now_ms` persists.
pub fn panic_record(
    reset_cause: ResetCause,
    now_ms: u32,
    loop_start_ms: u32,
    sensor: i16,
    battery: i16,
) -> FaultRecord {
    FaultRecord::at(
        FaultKind::DeviceFault,
        reset_cause,
        now_ms,
        loop_start_ms,
        sensor,
        battery,
    )
}

/// Install a panic hook that persists a [`FaultKind::DeviceFault`] record.
///
/// Must be called once during boot, after the reset cause is known.
/// On panic, logs the reason, appends a record to the NVS-backed ring
/// and lets the default handler abort, which restarts the device.
pub fn install_panic_handler(reset_cause: ResetCause, policy: CursorPolicy) {
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        error!("PANIC: {}", reason);

        #[cfg(target_os = "espidf")]
        {
            use crate::adapters::hardware::EspBoard;
            use crate::pins;

            // SAFETY: esp_timer_get_time is a plain counter read, safe from
            // panic context.
            let uptime_us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
            let record = panic_record(
                reset_cause,
                (uptime_us / 1_000) as u32,
                last_loop_start(),
                EspBoard::read_scaled(pins::SENSOR_ADC_CHANNEL),
                EspBoard::read_scaled(pins::BATTERY_ADC_CHANNEL),
            );

            // Reloads the ring image from NVS, so the runtime's own copy
            // of the cursor is not needed here.
            let storage = crate::adapters::nvs::NvsRingStorage::open(layout_len(LOG_CAPACITY, policy));
            match storage.and_then(|s| CrashStore::<_, LOG_CAPACITY>::open(s, policy)) {
                Ok(mut store) => {
                    if let Err(e) = store.append(&record) {
                        error!("Panic handler: fault record not persisted ({})", e);
                    }
                }
                Err(e) => error!("Panic handler: crash store unavailable ({})", e),
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = policy;
            error!(
                "Fault record (simulation): {} after {}",
                FaultKind::DeviceFault,
                reset_cause.primary()
            );
        }
    }));
}
