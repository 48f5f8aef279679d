//! Domain model module declarations.

pub mod coordinate;
pub mod device;
pub mod session;
