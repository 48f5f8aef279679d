//! Correction engine process handle.
//!
//! Spawns the engine with its generated configuration and terminates it in
//! two phases: a termination signal, a bounded wait, then a forced kill.
//! Terminating a process that has already exited is a no-op, so the output
//! monitor and an explicit stop may both attempt it.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{AppError, Result};

/// Engine handle shared between a session's registry entry and its monitor.
pub type SharedProcess = Arc<Mutex<EngineProcess>>;

/// How a termination request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited; nothing was sent.
    AlreadyExited,
    /// The process exited within the grace period.
    Graceful,
    /// The process was force-killed after the grace period.
    Killed,
}

/// Locate the engine binary and check that it can be executed.
///
/// Names without a path separator are searched on `PATH`.
///
/// # Errors
///
/// Returns `AppError::Binary` naming the attempted path if the binary does
/// not exist, is not a regular file, or is not executable.
pub fn resolve_engine_binary(binary: &Path) -> Result<PathBuf> {
    let candidate = if binary.components().count() > 1 || binary.is_absolute() {
        binary.to_path_buf()
    } else {
        env::var_os("PATH")
            .and_then(|paths| {
                env::split_paths(&paths)
                    .map(|dir| dir.join(binary))
                    .find(|path| path.is_file())
            })
            .ok_or_else(|| {
                AppError::Binary(format!("{} not found on PATH", binary.display()))
            })?
    };

    if !candidate.exists() {
        return Err(AppError::Binary(format!(
            "{} does not exist",
            candidate.display()
        )));
    }
    if !candidate.is_file() {
        return Err(AppError::Binary(format!(
            "{} is not a regular file",
            candidate.display()
        )));
    }
    if !is_executable(&candidate) {
        return Err(AppError::Binary(format!(
            "{} is not executable",
            candidate.display()
        )));
    }

    Ok(candidate)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A running (or exited) engine process.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitStatus>,
}

impl EngineProcess {
    /// Spawn `binary args... config_path` with standard streams discarded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the OS refuses to start the process.
    pub fn spawn(binary: &Path, args: &[String], config_path: &Path) -> Result<Self> {
        let child = Command::new(binary)
            .args(args)
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                AppError::Spawn(format!("failed to spawn {}: {err}", binary.display()))
            })?;

        let pid = child.id();
        info!(pid = pid.unwrap_or(0), binary = %binary.display(), "engine process spawned");

        Ok(Self {
            child,
            pid,
            exit: None,
        })
    }

    /// OS process id captured at spawn time.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status once observed.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Poll the process without blocking.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` if the OS wait call fails.
    pub fn has_exited(&mut self) -> Result<bool> {
        if self.exit.is_some() {
            return Ok(true);
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(AppError::Process(format!("failed to poll engine: {err}"))),
        }
    }

    /// Terminate gracefully, force-killing after `grace`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` only if the forced kill fails.
    pub async fn terminate(&mut self, grace: Duration) -> Result<Termination> {
        if self.has_exited().unwrap_or(false) {
            return Ok(Termination::AlreadyExited);
        }

        self.signal_terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid = self.pid.unwrap_or(0), ?status, "engine exited gracefully");
                self.exit = Some(status);
                return Ok(Termination::Graceful);
            }
            Ok(Err(err)) => {
                warn!(pid = self.pid.unwrap_or(0), %err, "error waiting for engine, forcing kill");
            }
            Err(_) => {
                warn!(
                    pid = self.pid.unwrap_or(0),
                    ?grace,
                    "engine did not exit within grace period, forcing kill"
                );
            }
        }

        self.child
            .kill()
            .await
            .map_err(|err| AppError::Process(format!("failed to kill engine: {err}")))?;
        self.exit = self.child.try_wait().ok().flatten();
        info!(pid = self.pid.unwrap_or(0), "engine force-killed");
        Ok(Termination::Killed)
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            warn!(pid, %err, "failed to send SIGTERM to engine");
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) {
        if let Err(err) = self.child.start_kill() {
            warn!(%err, "failed to request engine termination");
        }
    }
}
