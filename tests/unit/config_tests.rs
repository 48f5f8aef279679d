//! Unit tests for configuration parsing and validation.

use std::path::PathBuf;
use std::time::Duration;

use rtk_supervisor::config::{CoordinateSourceConfig, OutputFormat};
use rtk_supervisor::{AppError, GlobalConfig};

const MINIMAL: &str = r#"
[coordinate_source]
kind = "static"
lat = 45.0641
lon = 7.6697
alt = 239.0
"#;

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    assert_eq!(config.engine_binary, PathBuf::from("rtkrcv"));
    assert_eq!(config.engine_args, vec!["-s".to_owned(), "-o".to_owned()]);
    assert_eq!(config.output_format, OutputFormat::Pos);
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.grace_period(), Duration::from_secs(5));
    assert_eq!(config.device_pool, PathBuf::from("pool_list.json"));
    assert_eq!(config.processing.pos_mode, "kinematic");
    assert!((config.processing.ar_threshold - 3.0).abs() < f64::EPSILON);
}

#[test]
fn per_rover_paths_follow_serial_and_format() {
    let raw = format!("output_format = \"nmea\"\nconfig_dir = \"/cfg\"\noutput_dir = \"/out\"\n{MINIMAL}");
    let config = GlobalConfig::from_toml_str(&raw).expect("valid");
    assert_eq!(config.config_path_for("R1"), PathBuf::from("/cfg/R1.conf"));
    assert_eq!(config.output_path_for("R1"), PathBuf::from("/out/R1.nmea"));
}

#[test]
fn nmea_stream_source_defaults_timeout() {
    let config = GlobalConfig::from_toml_str("[coordinate_source]\nkind = \"nmea_stream\"\n")
        .expect("valid");
    assert_eq!(
        config.coordinate_source,
        CoordinateSourceConfig::NmeaStream { timeout_seconds: 10 }
    );
}

#[test]
fn missing_coordinate_source_is_rejected() {
    let err = GlobalConfig::from_toml_str("poll_interval_ms = 100\n").expect_err("invalid");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_intervals_are_rejected() {
    let err = GlobalConfig::from_toml_str(&format!("poll_interval_ms = 0\n{MINIMAL}"))
        .expect_err("zero poll");
    assert!(err.to_string().contains("poll_interval_ms"));

    let err = GlobalConfig::from_toml_str(&format!("grace_period_seconds = 0\n{MINIMAL}"))
        .expect_err("zero grace");
    assert!(err.to_string().contains("grace_period_seconds"));
}

#[test]
fn empty_engine_binary_is_rejected() {
    let err = GlobalConfig::from_toml_str(&format!("engine_binary = \"\"\n{MINIMAL}"))
        .expect_err("empty binary");
    assert!(err.to_string().contains("engine_binary"));
}

#[test]
fn out_of_range_static_coordinate_is_rejected() {
    let raw = "[coordinate_source]\nkind = \"static\"\nlat = 91.0\nlon = 0.0\nalt = 0.0\n";
    let err = GlobalConfig::from_toml_str(raw).expect_err("bad lat");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_from_missing_path_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(dir.path().join("absent.toml")).expect_err("missing");
    assert!(err.to_string().starts_with("config: failed to read config"));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, MINIMAL).expect("write");
    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(
        config.coordinate_source,
        CoordinateSourceConfig::Static {
            lat: 45.0641,
            lon: 7.6697,
            alt: 239.0
        }
    );
}
