//! Master reference coordinate providers.
//!
//! The engine needs the base antenna position of the master receiver. A
//! [`CoordinateSource`] supplies it or fails; it never falls back to a zero
//! coordinate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::CoordinateSourceConfig;
use crate::engine::solution::{parse_gga, Quality};
use crate::models::coordinate::Llh;
use crate::models::device::Device;
use crate::{AppError, Result};

/// Supplies the master's reference coordinate.
pub trait CoordinateSource: Send + Sync {
    /// Resolve the reference position of `master`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Coordinate` when no position can be determined.
    fn resolve<'a>(
        &'a self,
        master: &'a Device,
    ) -> Pin<Box<dyn Future<Output = Result<Llh>> + Send + 'a>>;
}

/// Build the provider selected in configuration.
///
/// # Errors
///
/// Returns `AppError::Coordinate` if a static coordinate is out of range.
pub fn from_config(config: &CoordinateSourceConfig) -> Result<Arc<dyn CoordinateSource>> {
    Ok(match *config {
        CoordinateSourceConfig::Static { lat, lon, alt } => {
            Arc::new(StaticCoordinateSource::new(Llh::new(lat, lon, alt)?))
        }
        CoordinateSourceConfig::NmeaStream { timeout_seconds } => {
            Arc::new(NmeaStreamSource::new(Duration::from_secs(timeout_seconds)))
        }
    })
}

/// Always returns the same surveyed coordinate.
#[derive(Debug, Clone, Copy)]
pub struct StaticCoordinateSource {
    coordinate: Llh,
}

impl StaticCoordinateSource {
    /// Wrap a known coordinate.
    #[must_use]
    pub fn new(coordinate: Llh) -> Self {
        Self { coordinate }
    }
}

impl CoordinateSource for StaticCoordinateSource {
    fn resolve<'a>(
        &'a self,
        _master: &'a Device,
    ) -> Pin<Box<dyn Future<Output = Result<Llh>> + Send + 'a>> {
        Box::pin(async move { Ok(self.coordinate) })
    }
}

/// Reads the master's own position from its NMEA stream.
///
/// Connects to the master endpoint and returns the first GGA sentence that
/// carries a valid (non-zero quality) position.
#[derive(Debug, Clone, Copy)]
pub struct NmeaStreamSource {
    timeout: Duration,
}

impl NmeaStreamSource {
    /// Create a source bounded by `timeout` for connect plus read.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn read_position(master: &Device) -> Result<Llh> {
        let endpoint = master.endpoint();
        let stream = TcpStream::connect(&endpoint)
            .await
            .map_err(|err| AppError::Coordinate(format!("cannot connect to master {endpoint}: {err}")))?;

        // The master endpoint may interleave binary RTCM3 frames with NMEA
        // text, so lines are read as bytes and decoded lossily.
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|err| AppError::Coordinate(format!("master stream read failed: {err}")))?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let Some(start) = line.find('$') else {
                continue;
            };
            match parse_gga(&line[start..]) {
                Ok(record) if record.quality != Quality::Other(0) => {
                    info!(
                        serial = master.serial,
                        lat = record.position.lat,
                        lon = record.position.lon,
                        alt = record.position.alt,
                        "master coordinate resolved from stream"
                    );
                    return Ok(record.position);
                }
                Ok(_) => debug!(serial = master.serial, "master reports no position yet"),
                Err(err) => debug!(serial = master.serial, %err, "skipping master stream line"),
            }
        }

        Err(AppError::Coordinate(format!(
            "master stream {endpoint} closed before reporting a position"
        )))
    }
}

impl CoordinateSource for NmeaStreamSource {
    fn resolve<'a>(
        &'a self,
        master: &'a Device,
    ) -> Pin<Box<dyn Future<Output = Result<Llh>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, Self::read_position(master))
                .await
                .map_err(|_| {
                    AppError::Coordinate(format!(
                        "no position from master {} within {:?}",
                        master.serial, self.timeout
                    ))
                })?
        })
    }
}
