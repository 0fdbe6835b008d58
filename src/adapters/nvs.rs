//! NVS (Non-Volatile Storage) adapter.
//!
//! Two views onto the ESP-IDF NVS partition:
//!
//! - [`NvsAdapter`] implements [`ConfigPort`]: the [`RuntimeConfig`] lives
//!   as one postcard blob, validated before it is persisted.
//! - [`NvsRingStorage`] implements [`NvStoragePort`]: the crash ring's
//!   byte image lives as one blob, mirrored in RAM so reads never touch
//!   flash and every write commits the whole image.
//!
//! ESP-IDF NVS commits are atomic per `nvs_commit()`, so a reset during a
//! ring write leaves either the old or the new image, never a torn one.
//! The simulation backend keeps everything in memory.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, NvStoragePort, StorageError};
use crate::config::RuntimeConfig;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"faultwatch\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"rtcfg\0";
#[cfg(target_os = "espidf")]
const RING_KEY: &[u8] = b"crashlog\0";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

/// Open the runtime namespace, execute a closure with the handle, then close.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, esp_err_t>
where
    F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
{
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    // SAFETY: NAMESPACE is NUL-terminated; NVS calls are made from the
    // main task (or the panic hook on that same task).
    let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK as esp_err_t {
        return Err(ret);
    }

    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

/// Read blob `key` into a fresh buffer.  `ESP_ERR_NVS_NOT_FOUND` is
/// passed through so callers can tell "absent" from "broken".
#[cfg(target_os = "espidf")]
fn read_blob(key: &[u8]) -> Result<Vec<u8>, esp_err_t> {
    with_nvs_handle(false, |handle| {
        let mut size: usize = 0;
        // First call: get size
        let ret = unsafe {
            nvs_get_blob(
                handle,
                key.as_ptr() as *const _,
                core::ptr::null_mut(),
                &mut size,
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        if size == 0 || size > MAX_BLOB_SIZE {
            return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
        }

        let mut buf = vec![0u8; size];
        let ret = unsafe {
            nvs_get_blob(
                handle,
                key.as_ptr() as *const _,
                buf.as_mut_ptr() as *mut _,
                &mut size,
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        Ok(buf)
    })
}

#[cfg(target_os = "espidf")]
fn write_blob(key: &[u8], bytes: &[u8]) -> Result<(), esp_err_t> {
    with_nvs_handle(true, |handle| {
        let ret = unsafe {
            nvs_set_blob(
                handle,
                key.as_ptr() as *const _,
                bytes.as_ptr() as *const _,
                bytes.len(),
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        let ret = unsafe { nvs_commit(handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        Ok(())
    })
}

// ───────────────────────────────────────────────────────────────
// Runtime configuration
// ───────────────────────────────────────────────────────────────

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically, which also
    /// wipes the crash ring.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: RefCell::new(None),
        })
    }

    /// Simulation: overwrite the stored blob, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_store_raw(&self, bytes: &[u8]) {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
    }
}

/// Decode and validate a stored blob.  A blob that decodes but fails
/// validation is treated like a corrupted one.
fn decode_config(bytes: &[u8]) -> Result<RuntimeConfig, ConfigError> {
    let cfg: RuntimeConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
    cfg.validate()?;
    Ok(cfg)
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.blob.borrow().as_deref() {
                Some(bytes) => {
                    let cfg = decode_config(bytes)?;
                    info!("NvsAdapter: loaded config from store");
                    Ok(cfg)
                }
                None => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(RuntimeConfig::default())
                }
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match read_blob(CONFIG_KEY) {
                Ok(bytes) => {
                    let cfg = decode_config(&bytes)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(RuntimeConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }

    fn save(&self, config: &RuntimeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            *self.blob.borrow_mut() = Some(bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            match write_blob(CONFIG_KEY, &bytes) {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Crash ring image
// ───────────────────────────────────────────────────────────────

/// Byte-addressable view of the crash-ring blob.
///
/// Requires [`NvsAdapter::new`] to have initialised NVS flash first.
pub struct NvsRingStorage {
    mirror: Vec<u8>,
}

impl NvsRingStorage {
    /// Load the ring image, sized to `len` bytes.  A missing blob starts
    /// zeroed; a stored blob of a different size (layout change between
    /// firmware builds) is truncated or zero-extended.
    pub fn open(len: usize) -> Result<Self, StorageError> {
        let mirror = vec![0u8; len];

        #[cfg(target_os = "espidf")]
        let mirror = {
            let mut mirror = mirror;
            match read_blob(RING_KEY) {
                Ok(stored) => {
                    let n = stored.len().min(len);
                    mirror[..n].copy_from_slice(&stored[..n]);
                    if stored.len() != len {
                        warn!(
                            "NvsRingStorage: stored image is {} bytes, expected {}",
                            stored.len(),
                            len
                        );
                    }
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => {
                    info!("NvsRingStorage: no crash log yet");
                }
                Err(e) => {
                    warn!("NvsRingStorage: NVS read error {}", e);
                    return Err(StorageError::IoError);
                }
            }
            mirror
        };

        info!("NvsRingStorage: {} byte image", mirror.len());
        Ok(Self { mirror })
    }

    /// Current image, as the next boot would read it.
    pub fn image(&self) -> &[u8] {
        &self.mirror
    }
}

/// Patch `data` into `mirror` at `offset` and hand the whole image to
/// `commit`.  A failed commit restores the bytes it replaced, so the mirror
/// never runs ahead of what is stored.
fn write_through<E: core::fmt::Display>(
    mirror: &mut [u8],
    offset: usize,
    data: &[u8],
    commit: impl FnOnce(&[u8]) -> Result<(), E>,
) -> Result<(), StorageError> {
    let end = offset
        .checked_add(data.len())
        .filter(|&end| end <= mirror.len())
        .ok_or(StorageError::OutOfBounds)?;

    let previous = mirror[offset..end].to_vec();
    mirror[offset..end].copy_from_slice(data);

    if let Err(e) = commit(mirror) {
        warn!("NvsRingStorage: commit failed ({}), image unchanged", e);
        mirror[offset..end].copy_from_slice(&previous);
        return Err(StorageError::IoError);
    }
    Ok(())
}

impl NvStoragePort for NvsRingStorage {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = offset
            .checked_add(buf.len())
            .and_then(|end| self.mirror.get(offset..end))
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        let commit = |image: &[u8]| write_blob(RING_KEY, image);
        #[cfg(not(target_os = "espidf"))]
        let commit = |_: &[u8]| Ok::<(), i32>(());

        write_through(&mut self.mirror, offset, data, commit)
    }

    fn capacity(&self) -> usize {
        self.mirror.len()
    }
}
