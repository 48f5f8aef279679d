//! Correction engine integration.
//!
//! Covers configuration rendering, master coordinate resolution, process
//! spawning and termination, and parsing of the engine's solution output.

pub mod config_gen;
pub mod coordinates;
pub mod process;
pub mod solution;
