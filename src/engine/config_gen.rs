//! RTKRCV configuration rendering.
//!
//! Produces one configuration file per rover: the rover stream as input 1,
//! the master stream as input 2 with its surveyed position as the base
//! antenna, and a file output stream in the configured sink format.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::{GlobalConfig, OutputFormat, ProcessingConfig};
use crate::models::coordinate::Llh;
use crate::models::device::Device;
use crate::{AppError, Result};

/// Renders and writes per-rover engine configurations.
#[derive(Debug, Clone, Copy)]
pub struct ConfigGenerator<'a> {
    config: &'a GlobalConfig,
}

impl<'a> ConfigGenerator<'a> {
    /// Create a generator bound to the global configuration.
    #[must_use]
    pub fn new(config: &'a GlobalConfig) -> Self {
        Self { config }
    }

    /// Render the configuration for `rover` and write it to its per-rover path.
    ///
    /// The file is flushed to disk before this returns so the engine never
    /// reads a partial configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be created or written.
    pub async fn generate(&self, rover: &Device, master: &Device, master_coord: &Llh) -> Result<PathBuf> {
        let path = self.config.config_path_for(&rover.serial);
        let output_path = self.config.output_path_for(&rover.serial);
        let content = render(
            rover,
            master,
            master_coord,
            &output_path,
            self.config.output_format,
            &self.config.processing,
            Utc::now(),
        );

        write_fully(&path, content.as_bytes())
            .await
            .map_err(|err| AppError::Config(format!("failed to write {}: {err}", path.display())))?;

        info!(serial = rover.serial, path = %path.display(), "engine configuration written");
        Ok(path)
    }
}

async fn write_fully(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Render the configuration text.
///
/// Output is a pure function of the arguments.
#[must_use]
pub fn render(
    rover: &Device,
    master: &Device,
    master_coord: &Llh,
    output_path: &Path,
    format: OutputFormat,
    processing: &ProcessingConfig,
    generated_at: DateTime<Utc>,
) -> String {
    let options: Vec<(&str, String)> = vec![
        ("console-passwd", "admin".into()),
        ("console-timetype", "gpst".into()),
        // Rover stream.
        ("inpstr1-type", "tcpcli".into()),
        ("inpstr1-path", rover.endpoint()),
        ("inpstr1-format", "rtcm3".into()),
        // Master stream.
        ("inpstr2-type", "tcpcli".into()),
        ("inpstr2-path", master.endpoint()),
        ("inpstr2-format", "rtcm3".into()),
        ("outstr1-type", "file".into()),
        ("outstr1-path", output_path.display().to_string()),
        ("outstr1-format", format.solution_format().into()),
        ("pos1-posmode", processing.pos_mode.clone()),
        ("pos1-frequency", processing.frequency.clone()),
        ("pos1-soltype", "forward".into()),
        ("pos1-elmask", processing.elevation_mask_deg.to_string()),
        ("pos1-dynamics", "on".into()),
        ("pos1-tidecorr", "off".into()),
        ("pos1-ionoopt", processing.iono_opt.clone()),
        ("pos1-tropopt", processing.tropo_opt.clone()),
        ("pos1-sateph", "brdc".into()),
        ("pos1-navsys", processing.nav_systems.to_string()),
        ("pos2-armode", processing.ar_mode.clone()),
        ("pos2-gloarmode", "on".into()),
        ("pos2-arthres", processing.ar_threshold.to_string()),
        ("pos2-arminfix", processing.ar_min_fix.to_string()),
        ("pos2-slipthres", "0.05".into()),
        ("pos2-maxage", "30".into()),
        ("out-solformat", format.solution_format().into()),
        ("out-outhead", "on".into()),
        ("out-outopt", "on".into()),
        ("out-timesys", "gpst".into()),
        ("out-timeform", "tow".into()),
        ("out-timendec", "3".into()),
        ("out-degform", "deg".into()),
        ("out-height", "ellipsoidal".into()),
        ("out-solstatic", "all".into()),
        ("ant1-postype", "llh".into()),
        ("ant1-pos1", "0".into()),
        ("ant1-pos2", "0".into()),
        ("ant1-pos3", "0".into()),
        // Base antenna at the master's surveyed position.
        ("ant2-postype", "llh".into()),
        ("ant2-pos1", format!("{:.9}", master_coord.lat)),
        ("ant2-pos2", format!("{:.9}", master_coord.lon)),
        ("ant2-pos3", format!("{:.4}", master_coord.alt)),
        ("misc-timeinterp", "off".into()),
    ];

    let mut out = format!(
        "# RTKRCV configuration for {} ({})\n# Generated at {}\n\n",
        rover.name,
        rover.serial,
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    for (key, value) in options {
        out.push_str(&format!("{key:<18}= {value}\n"));
    }
    out
}
