//! Unit tests for solution output parsing.

use rtk_supervisor::config::OutputFormat;
use rtk_supervisor::engine::solution::{latest_record, parse_record, Quality};
use rtk_supervisor::AppError;

const POS_FILE: &str = "\
% program   : RTKNAVI
%  GPST          latitude(deg) longitude(deg)  height(m)   Q  ns
2290 345600.000   45.064100000    7.669700000   239.0000   5   6
2290 345601.000   45.064105000    7.669705000   239.0500   2   8
2290 345602.000   45.064110000    7.669710000   239.1000   1   9
";

#[test]
fn newest_pos_record_wins() {
    let line = latest_record(POS_FILE, OutputFormat::Pos).unwrap();
    let record = parse_record(line, OutputFormat::Pos).unwrap();
    assert_eq!(record.quality, Quality::Fix);
    assert!((record.position.lat - 45.06411).abs() < 1e-9);
    assert!((record.position.alt - 239.1).abs() < 1e-9);
}

#[test]
fn header_only_file_has_no_record() {
    assert!(latest_record("% header\n\n%  GPST\n", OutputFormat::Pos).is_none());
    assert!(latest_record("", OutputFormat::Pos).is_none());
}

#[test]
fn truncated_trailing_line_falls_back_to_previous_record() {
    let content = format!("{POS_FILE}2290 345603.000   45.0641");
    let line = latest_record(&content, OutputFormat::Pos).unwrap();
    assert!(line.starts_with("2290 345602.000"));
}

#[test]
fn non_numeric_quality_is_a_parse_error() {
    let err = parse_record("2290 1.0 45.0 7.0 239.0 X 8", OutputFormat::Pos).unwrap_err();
    assert!(matches!(err, AppError::Parse(_)));
}

#[test]
fn out_of_range_latitude_is_rejected() {
    let err = parse_record("2290 1.0 95.0 7.0 239.0 1 8", OutputFormat::Pos).unwrap_err();
    assert!(matches!(err, AppError::Coordinate(_)));
}

#[test]
fn gga_quality_mapping() {
    assert_eq!(Quality::from_gga(4), Quality::Fix);
    assert_eq!(Quality::from_gga(5), Quality::Float);
    assert_eq!(Quality::from_gga(1), Quality::Single);
    assert_eq!(Quality::from_gga(2), Quality::Other(2));
    assert_eq!(Quality::from_gga(0), Quality::Other(0));
}

#[test]
fn nmea_file_ignores_other_sentences() {
    let content = "\
# header
$GPGGA,101010.000,4503.846,N,00740.182,E,5,08,1.2,239.0,M,45.3,M,2.0,0000*hh
$GPRMC,101010.000,A,4503.846,N,00740.182,E,0.0,0.0,010324,,,A*hh
";
    let line = latest_record(content, OutputFormat::Nmea).unwrap();
    let record = parse_record(line, OutputFormat::Nmea).unwrap();
    assert_eq!(record.quality, Quality::Float);
}

#[test]
fn truncated_gga_is_not_a_candidate() {
    assert!(latest_record("$GPGGA,101010.000,4503.846,N\n", OutputFormat::Nmea).is_none());
    let err = parse_record("$GPGGA,101010.000,4503.846,N", OutputFormat::Nmea).unwrap_err();
    assert!(matches!(err, AppError::Parse(_)));
}

#[test]
fn gga_without_geoid_separation_uses_msl() {
    let line = "$GNGGA,000000,4503.846,N,00740.182,E,4,10,0.8,239.0,M,,M,,*00";
    let record = parse_record(line, OutputFormat::Nmea).unwrap();
    assert!((record.position.alt - 239.0).abs() < 1e-9);
}
