#![forbid(unsafe_code)]

//! `rtk-supervisor`: runs and follows RTKRCV correction sessions.
//!
//! Loads configuration and the device pool, then starts a session for a
//! rover and follows it until it reaches a terminal status or the process
//! receives a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rtk_supervisor::engine::coordinates;
use rtk_supervisor::models::session::SessionStatus;
use rtk_supervisor::orchestrator::supervisor::{read_tail, DEFAULT_TAIL_LINES};
use rtk_supervisor::pool::loader::DevicePoolLoader;
use rtk_supervisor::pool::watcher::DevicePoolWatcher;
use rtk_supervisor::{AppError, GlobalConfig, Result, Supervisor};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rtk-supervisor", about = "RTKRCV session supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a session for a rover and follow it until fix, exit or signal.
    Run {
        /// Rover serial.
        serial: String,
    },
    /// Print the last lines of a rover's solution output.
    Tail {
        /// Rover serial.
        serial: String,
        /// Number of lines.
        #[arg(short = 'n', long, default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,
    },
    /// List the master and rovers in the pool.
    Devices,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = Arc::new(GlobalConfig::load_from_path(&args.config)?);
    info!(config = %args.config.display(), "configuration loaded");

    match args.command {
        Command::Run { serial } => run_session(config, &serial).await,
        Command::Tail { serial, lines } => {
            for line in read_tail(&config.output_path_for(&serial), lines).await {
                println!("{line}");
            }
            Ok(())
        }
        Command::Devices => {
            let pool = DevicePoolLoader::load(&config.device_pool)?;
            if pool.master().is_none() {
                warn!(path = %config.device_pool.display(), "no master configured");
            }
            for device in pool.master().into_iter().chain(pool.rovers()) {
                println!(
                    "{:<16} {:<20} {:?}\t{}",
                    device.serial,
                    device.name,
                    device.role,
                    device.endpoint()
                );
            }
            Ok(())
        }
    }
}

async fn run_session(config: Arc<GlobalConfig>, serial: &str) -> Result<()> {
    let watcher = DevicePoolWatcher::start(&config.device_pool)?;
    let source = coordinates::from_config(&config.coordinate_source)?;
    let supervisor = Supervisor::new(Arc::clone(&config), source, watcher.cache());

    let message = supervisor.try_start_session(serial).await.map_err(|err| {
        error!(serial, %err, "failed to start session");
        err
    })?;
    info!(serial, message, "session started");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut last = SessionStatus::Starting;
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            () = tokio::time::sleep(config.poll_interval()) => {}
        }

        let status = supervisor.get_status(serial).await;
        if status != last {
            info!(serial, from = %last, to = %status, "session status changed");
            last = status;
        }
        if status.is_terminal() {
            break;
        }
    }

    if let Some(session) = supervisor.session(serial).await {
        if let Some(position) = session.coordinates {
            println!(
                "fix {serial}: lat {:.9} lon {:.9} alt {:.4} | x {:.4} y {:.4} z {:.4}",
                position.llh.lat,
                position.llh.lon,
                position.llh.alt,
                position.ecef.x,
                position.ecef.y,
                position.ecef.z
            );
        }
        if let Some(message) = session.error {
            warn!(serial, %message, "session ended with error");
        }
    }

    supervisor.shutdown().await;
    info!("rtk-supervisor shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
