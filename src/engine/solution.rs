//! Solution record parsing for the engine's position output.
//!
//! Two sink formats are understood: RTKLIB `.pos` lines and NMEA GGA
//! sentences. Both reduce to a [`SolutionRecord`] carrying a quality
//! indicator and the reported position.

use crate::config::OutputFormat;
use crate::models::coordinate::Llh;
use crate::{AppError, Result};

/// Minimum whitespace-separated fields in a `.pos` record (through `Q`).
const POS_MIN_FIELDS: usize = 6;

/// Minimum comma-separated fields in a GGA sentence (through altitude).
const GGA_MIN_FIELDS: usize = 10;

/// Solution quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Integer ambiguities fixed.
    Fix,
    /// Float ambiguities.
    Float,
    /// Standalone solution.
    Single,
    /// Any other indicator (DGPS, SBAS, PPP, invalid), kept raw.
    Other(u8),
}

impl Quality {
    /// Classify an RTKLIB `.pos` `Q` value.
    #[must_use]
    pub fn from_pos(q: u8) -> Self {
        match q {
            1 => Self::Fix,
            2 => Self::Float,
            5 => Self::Single,
            other => Self::Other(other),
        }
    }

    /// Classify a GGA fix-quality value.
    #[must_use]
    pub fn from_gga(q: u8) -> Self {
        match q {
            4 => Self::Fix,
            5 => Self::Float,
            1 => Self::Single,
            other => Self::Other(other),
        }
    }
}

/// One parsed epoch of engine output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionRecord {
    /// Quality indicator.
    pub quality: Quality,
    /// Reported position.
    pub position: Llh,
}

/// Find the newest line that looks like a solution record.
///
/// Blank lines, comments and lines with too few fields are skipped. The
/// returned line may still fail [`parse_record`].
#[must_use]
pub fn latest_record(content: &str, format: OutputFormat) -> Option<&str> {
    content
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| is_candidate(line, format))
}

fn is_candidate(line: &str, format: OutputFormat) -> bool {
    if line.is_empty() || line.starts_with(format.comment_prefix()) {
        return false;
    }
    match format {
        OutputFormat::Pos => line.split_whitespace().count() >= POS_MIN_FIELDS,
        OutputFormat::Nmea => is_gga(line) && line.split(',').count() >= GGA_MIN_FIELDS,
    }
}

fn is_gga(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|tag| tag.starts_with('$') && tag.len() == 6 && tag.ends_with("GGA"))
}

/// Parse a single record in the given sink format.
///
/// # Errors
///
/// Returns `AppError::Parse` if the line is truncated or a field is not
/// numeric, or `AppError::Coordinate` if the position is out of range.
pub fn parse_record(line: &str, format: OutputFormat) -> Result<SolutionRecord> {
    match format {
        OutputFormat::Pos => parse_pos(line),
        OutputFormat::Nmea => parse_gga(line),
    }
}

/// Parse an RTKLIB `.pos` record: `date time lat lon height Q ns ...`.
///
/// # Errors
///
/// Returns `AppError::Parse` for truncated or non-numeric records.
pub fn parse_pos(line: &str) -> Result<SolutionRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < POS_MIN_FIELDS {
        return Err(AppError::Parse(format!(
            "pos record has {} fields, expected at least {POS_MIN_FIELDS}",
            fields.len()
        )));
    }

    let lat = parse_f64(fields[2], "latitude")?;
    let lon = parse_f64(fields[3], "longitude")?;
    let alt = parse_f64(fields[4], "height")?;
    let q = parse_u8(fields[5], "quality")?;

    Ok(SolutionRecord {
        quality: Quality::from_pos(q),
        position: Llh::new(lat, lon, alt)?,
    })
}

/// Parse a GGA sentence.
///
/// Latitude/longitude are accepted in the standard `ddmm.mmmm` /
/// `dddmm.mmmm` form or as plain decimal degrees. Altitude is the mean sea
/// level height plus the geoid separation when present.
///
/// # Errors
///
/// Returns `AppError::Parse` for non-GGA, truncated or non-numeric sentences.
pub fn parse_gga(line: &str) -> Result<SolutionRecord> {
    let body = line.trim().split('*').next().unwrap_or_default();
    if !is_gga(body) {
        return Err(AppError::Parse("not a GGA sentence".into()));
    }

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < GGA_MIN_FIELDS {
        return Err(AppError::Parse(format!(
            "GGA sentence has {} fields, expected at least {GGA_MIN_FIELDS}",
            fields.len()
        )));
    }

    let lat = nmea_angle(fields[2], fields[3], 2, 'S')?;
    let lon = nmea_angle(fields[4], fields[5], 3, 'W')?;
    let q = parse_u8(fields[6], "quality")?;
    let msl = parse_f64(fields[9], "altitude")?;
    let separation = match fields.get(11) {
        Some(sep) if !sep.is_empty() => parse_f64(sep, "geoid separation")?,
        _ => 0.0,
    };

    Ok(SolutionRecord {
        quality: Quality::from_gga(q),
        position: Llh::new(lat, lon, msl + separation)?,
    })
}

/// Convert an NMEA angle and hemisphere to signed decimal degrees.
fn nmea_angle(raw: &str, hemisphere: &str, degree_digits: usize, negative: char) -> Result<f64> {
    let value = parse_f64(raw, "angle")?;
    let integer_digits = raw.split('.').next().map_or(0, str::len);

    let degrees = if integer_digits >= degree_digits + 2 {
        let whole = (value / 100.0).trunc();
        whole + (value - whole * 100.0) / 60.0
    } else {
        value
    };

    match hemisphere.chars().next() {
        Some(h) if h == negative => Ok(-degrees),
        Some(_) => Ok(degrees),
        None => Err(AppError::Parse("missing hemisphere".into())),
    }
}

fn parse_f64(raw: &str, what: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|err| AppError::Parse(format!("invalid {what} {raw:?}: {err}")))
}

fn parse_u8(raw: &str, what: &str) -> Result<u8> {
    raw.trim()
        .parse::<u8>()
        .map_err(|err| AppError::Parse(format!("invalid {what} {raw:?}: {err}")))
}
