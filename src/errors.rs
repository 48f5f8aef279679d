//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all supervisor failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Master reference coordinate could not be resolved.
    Coordinate(String),
    /// Correction engine binary missing or not executable.
    Binary(String),
    /// Correction engine process failed to spawn.
    Spawn(String),
    /// Correction engine process could not be terminated.
    Process(String),
    /// Output monitor fault.
    Monitor(String),
    /// Malformed solution record or NMEA sentence.
    Parse(String),
    /// Device pool loading or lookup failure.
    Device(String),
    /// A session for the serial is already live.
    AlreadyActive(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Coordinate(msg) => write!(f, "coordinate: {msg}"),
            Self::Binary(msg) => write!(f, "engine binary: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Process(msg) => write!(f, "process: {msg}"),
            Self::Monitor(msg) => write!(f, "monitor: {msg}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::Device(msg) => write!(f, "device: {msg}"),
            Self::AlreadyActive(msg) => write!(f, "already active: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Device(format!("invalid device pool: {err}"))
    }
}
