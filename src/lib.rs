#![forbid(unsafe_code)]

//! Supervisor for RTKRCV differential-GNSS correction sessions.

pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod pool;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use orchestrator::supervisor::{Outcome, Supervisor};
