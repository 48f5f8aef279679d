//! Device pool file loader.
//!
//! Parses `{"devices": [...]}` into a [`DevicePool`]. A missing or empty
//! file is an empty pool; malformed JSON is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use crate::models::device::{DevicePool, DeviceRole};
use crate::{AppError, Result};

/// Loads the device pool from disk.
pub struct DevicePoolLoader;

impl DevicePoolLoader {
    /// Load the pool stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Device` if the file exists but cannot be read or
    /// does not contain a valid pool document.
    pub fn load(path: &Path) -> Result<DevicePool> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "device pool file not found, using empty pool");
                return Ok(DevicePool::default());
            }
            Err(err) => {
                return Err(AppError::Device(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        if raw.trim().is_empty() {
            warn!(path = %path.display(), "device pool file is empty");
            return Ok(DevicePool::default());
        }

        let pool: DevicePool = serde_json::from_str(&raw)?;
        let masters = pool
            .devices
            .iter()
            .filter(|d| d.role == DeviceRole::Master)
            .count();
        if masters > 1 {
            warn!(path = %path.display(), masters, "more than one master configured, the first is used");
        }
        Ok(pool)
    }
}
