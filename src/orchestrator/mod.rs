//! Session orchestration modules.
//!
//! Covers the session registry, the per-session output monitor, and the
//! supervisor that starts and stops correction engine sessions.

pub mod monitor;
pub mod registry;
pub mod supervisor;
