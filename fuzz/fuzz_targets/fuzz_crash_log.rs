//! Fuzz target: `CrashStore` ring over arbitrary storage images
//!
//! Opens the ring on an image taken straight from the fuzz input (torn
//! writes, erased flash, garbage cursor cells), then appends a few records
//! and verifies:
//! - No panics when decoding arbitrary bytes
//! - The restored cursor is always inside the ring
//! - `iter_all` always yields exactly `LOG_CAPACITY` entries
//! - An appended record reads back unchanged from the slot it landed in
//!
//! cargo fuzz run fuzz_crash_log

#![no_main]

use libfuzzer_sys::fuzz_target;
use faultwatch::app::ports::{NvStoragePort, StorageError};
use faultwatch::config::{CursorPolicy, LOG_CAPACITY};
use faultwatch::diagnostics::{CrashStore, FaultRecord, layout_len};
use faultwatch::error::FaultKind;
use faultwatch::reset_cause::ResetCause;

// ── In-memory NvStoragePort for fuzz testing ──────────────────

struct MemStore(Vec<u8>);

impl NvStoragePort for MemStore {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .0
            .get(offset..offset + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let dst = self
            .0
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.0.len()
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let policy = if selector & 1 == 0 {
        CursorPolicy::Persisted
    } else {
        CursorPolicy::ResetOnBoot
    };

    let len = layout_len(LOG_CAPACITY, policy);
    let mut image = vec![0u8; len];
    let n = rest.len().min(len);
    image[..n].copy_from_slice(&rest[..n]);

    let mut store = CrashStore::<_, LOG_CAPACITY>::open(MemStore(image), policy)
        .expect("a correctly sized image must always open");
    assert!(store.cursor() < LOG_CAPACITY);
    assert_eq!(store.iter_all().count(), LOG_CAPACITY);
    assert!(store.count() <= LOG_CAPACITY);

    // Drive 1–8 appends seeded from the tail of the input.
    let num_writes = (selector as usize >> 1) % 8 + 1;
    for i in 0..num_writes {
        let seed = rest.get(len + i).copied().unwrap_or(i as u8);
        let record = FaultRecord {
            error_code: FaultKind::from_code(seed % 9 + 1).unwrap_or(FaultKind::DeviceFault),
            reset_cause: ResetCause::from_bits(seed),
            uptime_secs: u32::from(seed) * 1000,
            sensor_value: i16::from(seed) - 128,
            battery_level: i16::from(seed) * 4,
            loop_duration_ms: u16::from(seed),
        };
        let slot = store.append(&record).expect("in-memory append cannot fail");
        assert_eq!(store.read_slot(slot), record);
        assert_eq!(store.latest(), Some((slot, record)));
    }

    store.clear().expect("in-memory clear cannot fail");
    assert_eq!(store.count(), 0);
});
