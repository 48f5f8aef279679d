//! Session supervisor: start, stop and query correction sessions.
//!
//! `start` runs entirely inside the registry critical section so two starts
//! for the same serial cannot race. `stop` removes the entry under the lock
//! and then terminates the engine outside it, so status queries never wait
//! on the grace period.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{GlobalConfig, OutputFormat};
use crate::engine::config_gen::ConfigGenerator;
use crate::engine::coordinates::CoordinateSource;
use crate::engine::process::{self, EngineProcess};
use crate::models::device::{validate_serial, Device, DeviceRole};
use crate::models::session::{Session, SessionStatus};
use crate::orchestrator::monitor::{spawn_output_monitor, MonitorContext};
use crate::orchestrator::registry::{SessionEntry, SessionRegistry};
use crate::pool::watcher::DeviceCache;
use crate::{AppError, Result};

/// Default number of lines returned by [`Supervisor::get_output_tail`].
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Result of an operator-facing operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Human-readable confirmation or error.
    pub message: String,
}

impl From<Result<String>> for Outcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(message) => Self { ok: true, message },
            Err(err) => Self {
                ok: false,
                message: err.to_string(),
            },
        }
    }
}

/// Owns the session registry and drives every session transition.
pub struct Supervisor {
    config: Arc<GlobalConfig>,
    registry: Arc<SessionRegistry>,
    coordinates: Arc<dyn CoordinateSource>,
    devices: DeviceCache,
}

impl Supervisor {
    /// Create a supervisor with an empty registry.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        coordinates: Arc<dyn CoordinateSource>,
        devices: DeviceCache,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            coordinates,
            devices,
        }
    }

    /// Start a session for the rover `serial` using the pool's master.
    pub async fn start_session(&self, serial: &str) -> Outcome {
        Outcome::from(self.try_start_session(serial).await)
    }

    /// Look up the rover and master in the device pool and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no rover has `serial`,
    /// `AppError::Device` if no master is configured, or any error from
    /// [`Supervisor::start`].
    pub async fn try_start_session(&self, serial: &str) -> Result<String> {
        let (rover, master) = {
            let pool = self.devices.read().await;
            (pool.find_rover(serial).cloned(), pool.master().cloned())
        };

        let rover = rover.ok_or_else(|| AppError::NotFound(format!("rover {serial} not found")))?;
        let master = master.ok_or_else(|| AppError::Device("no master configured".into()))?;
        self.start(&rover, &master).await
    }

    /// Stop the session for `serial`.
    pub async fn stop_session(&self, serial: &str) -> Outcome {
        Outcome::from(self.stop(serial).await)
    }

    /// Launch the engine for `rover` against `master` and start monitoring it.
    ///
    /// # Errors
    ///
    /// - `AppError::AlreadyActive` if the serial's engine is still alive.
    /// - `AppError::Coordinate` if the master position cannot be resolved.
    /// - `AppError::Config` / `AppError::Io` on file-system failures.
    /// - `AppError::Binary` if the engine is missing or not executable.
    /// - `AppError::Spawn` if the engine fails to start.
    pub async fn start(&self, rover: &Device, master: &Device) -> Result<String> {
        let span = info_span!("start_session", serial = %rover.serial, master = %master.serial);
        self.start_inner(rover, master).instrument(span).await
    }

    async fn start_inner(&self, rover: &Device, master: &Device) -> Result<String> {
        validate_serial(&rover.serial)?;
        if rover.role != DeviceRole::Rover {
            return Err(AppError::Device(format!("{} is not a rover", rover.serial)));
        }
        if master.role != DeviceRole::Master {
            return Err(AppError::Device(format!("{} is not a master", master.serial)));
        }

        let serial = rover.serial.clone();
        let mut sessions = self.registry.lock().await;

        if let Some(existing) = sessions.get(&serial) {
            // A held process mutex means the engine is being terminated;
            // waiting for it here would stall every registry reader.
            let alive = match existing.process.try_lock() {
                Ok(mut process) => !process.has_exited().unwrap_or(true),
                Err(_) => true,
            };
            if alive {
                return Err(AppError::AlreadyActive(format!(
                    "session already active for rover {serial}"
                )));
            }
        }

        tokio::fs::create_dir_all(&self.config.config_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let master_coord = self.coordinates.resolve(master).await?;
        let config_path = ConfigGenerator::new(&self.config)
            .generate(rover, master, &master_coord)
            .await?;

        let binary = process::resolve_engine_binary(&self.config.engine_binary)?;

        let output_path = self.config.output_path_for(&serial);
        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => debug!(path = %output_path.display(), "removed stale output file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let engine = EngineProcess::spawn(&binary, &self.config.engine_args, &config_path)?;
        let pid = engine.id();

        let session = Session::new(
            serial.clone(),
            rover.name.clone(),
            config_path,
            output_path.clone(),
        );
        let run_id = session.run_id.clone();
        let process = Arc::new(Mutex::new(engine));
        let cancel = CancellationToken::new();

        let monitor = spawn_output_monitor(
            MonitorContext {
                serial: serial.clone(),
                run_id: run_id.clone(),
                output_path,
                format: self.config.output_format,
                poll_interval: self.config.poll_interval(),
                grace: self.config.grace_period(),
                process: Arc::clone(&process),
                registry: Arc::clone(&self.registry),
            },
            cancel.clone(),
        );

        let replaced = sessions.insert(
            serial.clone(),
            SessionEntry {
                session,
                process,
                cancel,
                monitor: Some(monitor),
            },
        );
        drop(sessions);

        if let Some(old) = replaced {
            old.cancel.cancel();
            debug!(old_run = old.session.run_id, "replaced terminal session");
        }

        info!(run_id, pid = pid.unwrap_or(0), "session started");
        Ok(format!("RTKRCV session started for {}", rover.name))
    }

    /// Stop the session for `serial`, terminating its engine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if there is no session, or
    /// `AppError::Process` if the engine could not be force-killed. The entry
    /// is removed in both the success and the kill-failure case.
    pub async fn stop(&self, serial: &str) -> Result<String> {
        let span = info_span!("stop_session", serial);
        self.stop_inner(serial).instrument(span).await
    }

    async fn stop_inner(&self, serial: &str) -> Result<String> {
        let entry = self
            .registry
            .remove(serial)
            .await
            .ok_or_else(|| AppError::NotFound(format!("no active session for rover {serial}")))?;

        entry.cancel.cancel();

        let termination = entry
            .process
            .lock()
            .await
            .terminate(self.config.grace_period())
            .await;

        if let Err(err) = append_marker(&entry.session.output_path, self.config.output_format).await {
            warn!(%err, "failed to append session end marker");
        }

        if let Some(monitor) = entry.monitor {
            if let Err(err) = monitor.await {
                warn!(%err, "output monitor task failed during stop");
            }
        }

        let how = termination?;
        info!(?how, "session stopped");
        Ok(format!("session stopped for rover {serial}"))
    }

    /// Current status; `Stopped` when there is no session.
    pub async fn get_status(&self, serial: &str) -> SessionStatus {
        self.registry.status(serial).await
    }

    /// Whether the session's engine process is still alive.
    ///
    /// An engine that is being terminated counts as alive until it has exited.
    pub async fn is_session_running(&self, serial: &str) -> bool {
        let process = {
            let sessions = self.registry.lock().await;
            match sessions.get(serial) {
                Some(entry) => Arc::clone(&entry.process),
                None => return false,
            }
        };
        let Ok(mut guard) = process.try_lock() else {
            return true;
        };
        matches!(guard.has_exited(), Ok(false))
    }

    /// Copy of the session record for `serial`.
    pub async fn session(&self, serial: &str) -> Option<Session> {
        self.registry.get(serial).await
    }

    /// Copies of all session records.
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.registry.list().await
    }

    /// Last `lines` lines of the rover's output file.
    ///
    /// Returns an empty list if the file does not exist and a single
    /// diagnostic line if it cannot be read.
    pub async fn get_output_tail(&self, serial: &str, lines: usize) -> Vec<String> {
        if let Err(err) = validate_serial(serial) {
            return vec![err.to_string()];
        }
        read_tail(&self.config.output_path_for(serial), lines).await
    }

    /// Stop every session.
    pub async fn shutdown(&self) {
        let serials: Vec<String> = self
            .registry
            .list()
            .await
            .into_iter()
            .map(|session| session.serial)
            .collect();

        for serial in serials {
            if let Err(err) = self.stop(&serial).await {
                warn!(serial, %err, "failed to stop session during shutdown");
            }
        }

        // Sessions started concurrently with shutdown.
        for entry in self.registry.drain().await {
            entry.cancel.cancel();
            if let Err(err) = entry.process.lock().await.terminate(self.config.grace_period()).await {
                warn!(serial = entry.session.serial, %err, "failed to terminate engine during shutdown");
            }
        }
    }
}

async fn append_marker(path: &Path, format: OutputFormat) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let marker = format!(
        "{} Session ended at {}\n",
        format.comment_prefix(),
        Utc::now().to_rfc3339()
    );
    file.write_all(marker.as_bytes()).await?;
    file.flush().await
}

/// Read the last `lines` lines of `path`, trimmed, in file order.
pub async fn read_tail(path: &Path, lines: usize) -> Vec<String> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => return vec![format!("failed to read output file: {err}")],
    };

    let content = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].iter().map(|line| line.trim().to_owned()).collect()
}
