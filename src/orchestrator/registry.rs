//! In-memory session registry.
//!
//! A single mutex guards the whole `serial → entry` table. Every
//! read-modify-write (start's existence check and insert, stop's lookup and
//! removal, a monitor's status update) is one critical section. Nothing
//! sleeps or waits on a process while holding the lock, except `start`,
//! which must keep the slot reserved across config generation and spawn.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::process::SharedProcess;
use crate::models::session::{Session, SessionStatus};

/// Registry row: the session record plus the resources it owns.
#[derive(Debug)]
pub struct SessionEntry {
    /// Session record exposed to callers.
    pub session: Session,
    /// Engine process handle, shared with the monitor.
    pub process: SharedProcess,
    /// Cancels the output monitor.
    pub cancel: CancellationToken,
    /// Output monitor task.
    pub monitor: Option<JoinHandle<()>>,
}

/// Table of sessions keyed by rover serial.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the registry lock for a multi-step critical section.
    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().await
    }

    /// Copy of the session record for `serial`.
    pub async fn get(&self, serial: &str) -> Option<Session> {
        self.sessions
            .lock()
            .await
            .get(serial)
            .map(|entry| entry.session.clone())
    }

    /// Current status, `Stopped` when no entry exists.
    pub async fn status(&self, serial: &str) -> SessionStatus {
        self.sessions
            .lock()
            .await
            .get(serial)
            .map_or(SessionStatus::Stopped, |entry| entry.session.status)
    }

    /// Copies of all session records, ordered by serial.
    pub async fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.serial.cmp(&b.serial));
        sessions
    }

    /// Mutate the session for `serial` if it still belongs to run `run_id`.
    ///
    /// Returns the closure's result, or `false` when the entry is gone or
    /// has been replaced by a newer run.
    pub async fn update<F>(&self, serial: &str, run_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Session) -> bool,
    {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(serial) {
            Some(entry) if entry.session.run_id == run_id => f(&mut entry.session),
            _ => false,
        }
    }

    /// Remove and return the entry for `serial`.
    pub async fn remove(&self, serial: &str) -> Option<SessionEntry> {
        self.sessions.lock().await.remove(serial)
    }

    /// Remove and return every entry.
    pub async fn drain(&self) -> Vec<SessionEntry> {
        self.sessions
            .lock()
            .await
            .drain()
            .map(|(_, entry)| entry)
            .collect()
    }
}
