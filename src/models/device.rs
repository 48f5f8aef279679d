//! Device records consumed from the device pool.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Role a receiver plays in a differential session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceRole {
    /// Fixed reference receiver broadcasting corrections.
    Master,
    /// Mobile receiver whose position is being solved.
    Rover,
}

/// A GNSS receiver reachable over TCP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Display name.
    pub name: String,
    /// Unique serial; keys sessions and per-rover files.
    pub serial: String,
    /// Stream host.
    pub ip: String,
    /// Stream port.
    pub port: u16,
    /// Master or rover.
    pub role: DeviceRole,
}

impl Device {
    /// `host:port` endpoint for the engine's `tcpcli` input streams.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// The full device list as stored in the pool file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevicePool {
    /// All configured receivers.
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DevicePool {
    /// Rover with the given serial, if one exists.
    #[must_use]
    pub fn find_rover(&self, serial: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.role == DeviceRole::Rover && d.serial == serial)
    }

    /// The reference receiver. Only one master is expected; the first wins.
    #[must_use]
    pub fn master(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.role == DeviceRole::Master)
    }

    /// Iterate over all rovers.
    pub fn rovers(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.role == DeviceRole::Rover)
    }
}

fn serial_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").ok())
        .as_ref()
}

/// Check that a serial is safe to embed in per-rover file names.
///
/// # Errors
///
/// Returns `AppError::Device` for empty serials, `.`/`..`, or any character
/// outside `[A-Za-z0-9._-]`.
pub fn validate_serial(serial: &str) -> Result<()> {
    let well_formed = serial_pattern().is_some_and(|pattern| pattern.is_match(serial));
    if !well_formed || serial == "." || serial == ".." {
        return Err(AppError::Device(format!("invalid serial {serial:?}")));
    }
    Ok(())
}
