//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Solution sink format written by the correction engine.
///
/// The generator, the output monitor, the tail reader and the stop marker
/// all derive their behaviour from this single setting.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// RTKLIB position solution (`.pos`), one record per epoch.
    #[default]
    Pos,
    /// NMEA-0183 GGA sentences (`.nmea`).
    Nmea,
}

impl OutputFormat {
    /// File extension for the output file.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pos => "pos",
            Self::Nmea => "nmea",
        }
    }

    /// Value of the engine's `out-solformat` option.
    #[must_use]
    pub fn solution_format(self) -> &'static str {
        match self {
            Self::Pos => "llh",
            Self::Nmea => "nmea",
        }
    }

    /// Prefix marking a comment line in the output file.
    #[must_use]
    pub fn comment_prefix(self) -> &'static str {
        match self {
            Self::Pos => "%",
            Self::Nmea => "#",
        }
    }
}

/// Provider of the master's reference coordinate.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateSourceConfig {
    /// Fixed, surveyed coordinate.
    Static {
        /// Latitude in decimal degrees.
        lat: f64,
        /// Longitude in decimal degrees.
        lon: f64,
        /// Ellipsoidal height in meters.
        alt: f64,
    },
    /// Read the first valid GGA position from the master's TCP stream.
    NmeaStream {
        /// Upper bound on connecting and waiting for a position.
        #[serde(default = "default_stream_timeout")]
        timeout_seconds: u64,
    },
}

fn default_stream_timeout() -> u64 {
    10
}

/// Engine processing options rendered into the generated configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessingConfig {
    /// Positioning mode (`kinematic`, `static`, ...).
    #[serde(default = "default_pos_mode")]
    pub pos_mode: String,
    /// Carrier frequencies (`l1`, `l1+l2`, ...).
    #[serde(default = "default_frequency")]
    pub frequency: String,
    /// Elevation mask in degrees.
    #[serde(default = "default_elevation_mask")]
    pub elevation_mask_deg: u32,
    /// Navigation system bitmask (1 = GPS).
    #[serde(default = "default_nav_systems")]
    pub nav_systems: u32,
    /// Ionosphere correction option.
    #[serde(default = "default_iono")]
    pub iono_opt: String,
    /// Troposphere correction option.
    #[serde(default = "default_tropo")]
    pub tropo_opt: String,
    /// Integer ambiguity resolution mode.
    #[serde(default = "default_ar_mode")]
    pub ar_mode: String,
    /// Ratio-test threshold for validating fixed ambiguities.
    #[serde(default = "default_ar_threshold")]
    pub ar_threshold: f64,
    /// Minimum consecutive fixes before holding ambiguities.
    #[serde(default = "default_ar_min_fix")]
    pub ar_min_fix: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pos_mode: default_pos_mode(),
            frequency: default_frequency(),
            elevation_mask_deg: default_elevation_mask(),
            nav_systems: default_nav_systems(),
            iono_opt: default_iono(),
            tropo_opt: default_tropo(),
            ar_mode: default_ar_mode(),
            ar_threshold: default_ar_threshold(),
            ar_min_fix: default_ar_min_fix(),
        }
    }
}

fn default_pos_mode() -> String {
    "kinematic".into()
}

fn default_frequency() -> String {
    "l1+l2".into()
}

fn default_elevation_mask() -> u32 {
    15
}

fn default_nav_systems() -> u32 {
    1
}

fn default_iono() -> String {
    "brdc".into()
}

fn default_tropo() -> String {
    "saas".into()
}

fn default_ar_mode() -> String {
    "continuous".into()
}

fn default_ar_threshold() -> f64 {
    3.0
}

fn default_ar_min_fix() -> u32 {
    10
}

fn default_engine_binary() -> PathBuf {
    PathBuf::from("rtkrcv")
}

fn default_engine_args() -> Vec<String> {
    vec!["-s".into(), "-o".into()]
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_device_pool() -> PathBuf {
    PathBuf::from("pool_list.json")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_grace_period_seconds() -> u64 {
    5
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Correction engine executable; bare names are looked up on `PATH`.
    #[serde(default = "default_engine_binary")]
    pub engine_binary: PathBuf,
    /// Arguments placed before the generated configuration path.
    #[serde(default = "default_engine_args")]
    pub engine_args: Vec<String>,
    /// Directory receiving one generated configuration per rover.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Directory receiving one solution output file per rover.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Solution sink format.
    #[serde(default)]
    pub output_format: OutputFormat,
    /// JSON device pool file.
    #[serde(default = "default_device_pool")]
    pub device_pool: PathBuf,
    /// Output monitor polling interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Time allowed for graceful engine exit before a forced kill.
    #[serde(default = "default_grace_period_seconds")]
    pub grace_period_seconds: u64,
    /// Master reference coordinate provider.
    pub coordinate_source: CoordinateSourceConfig,
    /// Engine processing options.
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Output monitor polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Grace period between the termination signal and the forced kill.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }

    /// Generated engine configuration path for a rover serial.
    #[must_use]
    pub fn config_path_for(&self, serial: &str) -> PathBuf {
        self.config_dir.join(format!("{serial}.conf"))
    }

    /// Solution output path for a rover serial.
    #[must_use]
    pub fn output_path_for(&self, serial: &str) -> PathBuf {
        self.output_dir
            .join(format!("{serial}.{}", self.output_format.extension()))
    }

    fn validate(&self) -> Result<()> {
        if self.engine_binary.as_os_str().is_empty() {
            return Err(AppError::Config("engine_binary must not be empty".into()));
        }

        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.grace_period_seconds == 0 {
            return Err(AppError::Config(
                "grace_period_seconds must be greater than zero".into(),
            ));
        }

        match self.coordinate_source {
            CoordinateSourceConfig::Static { lat, lon, .. } => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(AppError::Config(format!(
                        "static master coordinate out of range: lat {lat}, lon {lon}"
                    )));
                }
            }
            CoordinateSourceConfig::NmeaStream { timeout_seconds } => {
                if timeout_seconds == 0 {
                    return Err(AppError::Config(
                        "coordinate_source.timeout_seconds must be greater than zero".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}
