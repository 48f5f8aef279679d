//! Output monitor: follows one session's solution file.
//!
//! Each poll checks engine liveness, reads the output file, and classifies
//! the newest solution record. The first fixed solution records the rover
//! position, terminates the engine and ends the monitor. Errors and panics
//! inside the loop are caught at the task boundary; they mark the session as
//! `Error` and terminate the engine.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::OutputFormat;
use crate::engine::process::SharedProcess;
use crate::engine::solution::{self, Quality};
use crate::models::coordinate::FixedPosition;
use crate::models::session::SessionStatus;
use crate::orchestrator::registry::SessionRegistry;
use crate::{AppError, Result};

/// Everything a monitor needs to follow one session run.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    /// Rover serial.
    pub serial: String,
    /// Run the monitor belongs to; updates for other runs are dropped.
    pub run_id: String,
    /// Engine solution output.
    pub output_path: PathBuf,
    /// Sink format of the output file.
    pub format: OutputFormat,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Grace period used when terminating the engine on fix or failure.
    pub grace: Duration,
    /// Engine process handle.
    pub process: SharedProcess,
    /// Registry holding the session.
    pub registry: Arc<SessionRegistry>,
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poll {
    Continue,
    Finished,
}

/// Spawn the monitor for a session.
///
/// The returned handle completes once the monitor has ended, including the
/// `Error` bookkeeping when the inner loop failed or panicked.
#[must_use]
pub fn spawn_output_monitor(ctx: MonitorContext, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let inner = tokio::spawn(run(ctx.clone(), cancel));

        let failure = match inner.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(err) if err.is_panic() => {
                Some(AppError::Monitor("output monitor panicked".into()).to_string())
            }
            Err(_) => None,
        };

        if let Some(message) = failure {
            error!(serial = ctx.serial, run_id = ctx.run_id, %message, "output monitor failed");
            ctx.registry
                .update(&ctx.serial, &ctx.run_id, |session| {
                    session.record_error(message)
                })
                .await;

            // Nothing watches the engine any more.
            let termination = ctx.process.lock().await.terminate(ctx.grace).await;
            match termination {
                Ok(how) => {
                    info!(serial = ctx.serial, ?how, "engine terminated after monitor failure");
                }
                Err(err) => {
                    warn!(serial = ctx.serial, %err, "failed to terminate engine after monitor failure");
                }
            }
        }
    })
}

async fn run(ctx: MonitorContext, cancel: CancellationToken) -> Result<()> {
    info!(serial = ctx.serial, path = %ctx.output_path.display(), "output monitor started");

    loop {
        if cancel.is_cancelled() {
            break;
        }
        if poll_once(&ctx).await? == Poll::Finished {
            break;
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }

    info!(serial = ctx.serial, "output monitor finished");
    Ok(())
}

async fn poll_once(ctx: &MonitorContext) -> Result<Poll> {
    let exited = ctx.process.lock().await.has_exited()?;
    if exited {
        let stopped = ctx
            .registry
            .update(&ctx.serial, &ctx.run_id, |session| {
                session.transition(SessionStatus::Stopped)
            })
            .await;
        if stopped {
            info!(serial = ctx.serial, "engine exited, session stopped");
        }
        return Ok(Poll::Finished);
    }

    let became_running = ctx
        .registry
        .update(&ctx.serial, &ctx.run_id, |session| {
            session.status == SessionStatus::Starting && session.transition(SessionStatus::Running)
        })
        .await;
    if became_running {
        info!(serial = ctx.serial, "engine running");
    }

    let bytes = match tokio::fs::read(&ctx.output_path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(serial = ctx.serial, "output file not created yet");
            return Ok(Poll::Continue);
        }
        Err(err) => return Err(err.into()),
    };
    let content = String::from_utf8_lossy(&bytes);

    let Some(line) = solution::latest_record(&content, ctx.format) else {
        return Ok(Poll::Continue);
    };

    let record = match solution::parse_record(line, ctx.format) {
        Ok(record) => record,
        Err(err) => {
            debug!(serial = ctx.serial, %err, "ignoring malformed solution record");
            return Ok(Poll::Continue);
        }
    };

    match record.quality {
        Quality::Fix => {
            let position = FixedPosition::from(record.position);
            let recorded = ctx
                .registry
                .update(&ctx.serial, &ctx.run_id, |session| session.record_fix(position))
                .await;
            if recorded {
                info!(
                    serial = ctx.serial,
                    lat = position.llh.lat,
                    lon = position.llh.lon,
                    alt = position.llh.alt,
                    x = position.ecef.x,
                    y = position.ecef.y,
                    z = position.ecef.z,
                    "fixed solution reached"
                );
            }

            let termination = ctx.process.lock().await.terminate(ctx.grace).await;
            match termination {
                Ok(how) => info!(serial = ctx.serial, ?how, "engine terminated after fix"),
                Err(err) => warn!(serial = ctx.serial, %err, "failed to terminate engine after fix"),
            }
            Ok(Poll::Finished)
        }
        Quality::Float => {
            set_quality(ctx, SessionStatus::Float).await;
            Ok(Poll::Continue)
        }
        Quality::Single => {
            set_quality(ctx, SessionStatus::Single).await;
            Ok(Poll::Continue)
        }
        Quality::Other(q) => {
            debug!(serial = ctx.serial, quality = q, "ignoring unclassified solution quality");
            Ok(Poll::Continue)
        }
    }
}

async fn set_quality(ctx: &MonitorContext, status: SessionStatus) {
    let changed = ctx
        .registry
        .update(&ctx.serial, &ctx.run_id, |session| session.transition(status))
        .await;
    if changed {
        info!(serial = ctx.serial, %status, "solution quality changed");
    }
}
