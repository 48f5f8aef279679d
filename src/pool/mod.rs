//! Read-only access to the device pool.
//!
//! The pool file is owned by an external collaborator; this module only
//! loads it and keeps an in-memory copy current.

pub mod loader;
pub mod watcher;
