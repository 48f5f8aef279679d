#![allow(dead_code)]

//! Shared helpers for supervisor integration tests.
//!
//! Builds an isolated workspace per test: config and output directories in
//! a temp dir, a device pool with one master and one rover, and a dummy
//! engine script run through `/bin/sh`. The script receives the generated
//! configuration path as `$1` and can find its output file with
//! [`OUTPUT_PATH_SNIPPET`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtk_supervisor::engine::coordinates::{CoordinateSource, StaticCoordinateSource};
use rtk_supervisor::models::coordinate::Llh;
use rtk_supervisor::models::device::{Device, DevicePool, DeviceRole};
use rtk_supervisor::models::session::SessionStatus;
use rtk_supervisor::{AppError, GlobalConfig, Result, Supervisor};
use tempfile::TempDir;
use tokio::sync::RwLock;

pub const ROVER_SERIAL: &str = "ROVER001";
pub const MASTER_SERIAL: &str = "MASTER001";

/// Shell line assigning the engine's output path to `$out`.
pub const OUTPUT_PATH_SNIPPET: &str = r#"out=$(sed -n 's/^outstr1-path *= *//p' "$1")"#;

/// Engine that stays alive until signalled.
pub const LONG_RUNNING_ENGINE: &str = "exec sleep 30\n";

/// A supervisor wired to a throwaway workspace.
pub struct Harness {
    pub dir: TempDir,
    pub config: Arc<GlobalConfig>,
    pub supervisor: Supervisor,
}

pub fn rover(serial: &str) -> Device {
    Device {
        name: format!("Rover {serial}"),
        serial: serial.to_owned(),
        ip: "127.0.0.1".into(),
        port: 5001,
        role: DeviceRole::Rover,
    }
}

pub fn master() -> Device {
    Device {
        name: "Base".into(),
        serial: MASTER_SERIAL.into(),
        ip: "10.0.0.2".into(),
        port: 2101,
        role: DeviceRole::Master,
    }
}

pub fn reference_coordinate() -> Llh {
    Llh::new(45.0641, 7.6697, 239.0).unwrap()
}

/// Build a config TOML rooted at `root` running `script` through `/bin/sh`.
pub fn config_toml(root: &Path, script: &Path, output_format: &str) -> String {
    format!(
        r#"
engine_binary = "/bin/sh"
engine_args = ['{script}']
config_dir = '{root}/config'
output_dir = '{root}/output'
output_format = "{output_format}"
device_pool = '{root}/pool_list.json'
poll_interval_ms = 50
grace_period_seconds = 1

[coordinate_source]
kind = "static"
lat = 45.0641
lon = 7.6697
alt = 239.0
"#,
        root = root.display(),
        script = script.display(),
    )
}

pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("engine.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    path
}

pub fn harness(engine_body: &str) -> Harness {
    harness_with_format(engine_body, "pos")
}

pub fn harness_with_format(engine_body: &str, output_format: &str) -> Harness {
    build_harness(engine_body, output_format, 1)
}

/// Harness whose stop and fix termination wait `grace_seconds` before killing.
pub fn harness_with_grace(engine_body: &str, grace_seconds: u64) -> Harness {
    build_harness(engine_body, "pos", grace_seconds)
}

fn build_harness(engine_body: &str, output_format: &str, grace_seconds: u64) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), engine_body);
    let raw = config_toml(dir.path(), &script, output_format).replace(
        "grace_period_seconds = 1",
        &format!("grace_period_seconds = {grace_seconds}"),
    );
    let config = GlobalConfig::from_toml_str(&raw).expect("valid test config");
    harness_from_config(dir, config, Arc::new(StaticCoordinateSource::new(reference_coordinate())))
}

pub fn harness_from_config(
    dir: TempDir,
    config: GlobalConfig,
    source: Arc<dyn CoordinateSource>,
) -> Harness {
    let pool = DevicePool {
        devices: vec![master(), rover(ROVER_SERIAL)],
    };
    let config = Arc::new(config);
    let supervisor = Supervisor::new(Arc::clone(&config), source, Arc::new(RwLock::new(pool)));
    Harness {
        dir,
        config,
        supervisor,
    }
}

/// Poll until the session reaches `wanted` or `timeout` elapses.
pub async fn wait_for_status(
    supervisor: &Supervisor,
    serial: &str,
    wanted: SessionStatus,
    timeout: Duration,
) -> SessionStatus {
    let deadline = Instant::now() + timeout;
    loop {
        let status = supervisor.get_status(serial).await;
        if status == wanted || Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Poll until the engine for `serial` is no longer running.
pub async fn wait_until_not_running(supervisor: &Supervisor, serial: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !supervisor.is_session_running(serial).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

/// Coordinate source that always fails.
pub struct UnavailableSource;

impl CoordinateSource for UnavailableSource {
    fn resolve<'a>(
        &'a self,
        master: &'a Device,
    ) -> Pin<Box<dyn Future<Output = Result<Llh>> + Send + 'a>> {
        Box::pin(async move {
            Err(AppError::Coordinate(format!(
                "master {} has not reported a position",
                master.serial
            )))
        })
    }
}
