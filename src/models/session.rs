//! Session model and lifecycle helpers.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::FixedPosition;

/// Positioning-quality status for a correction session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Engine spawned, not yet observed alive by the monitor.
    Starting,
    /// Engine alive, no classified solution yet.
    Running,
    /// Float ambiguity solution.
    Float,
    /// Standalone, unconverged solution.
    Single,
    /// Fixed ambiguity solution; terminal.
    Fix,
    /// Engine exited or was stopped; terminal.
    Stopped,
    /// Supervisor-detected fault; terminal.
    Error,
}

impl SessionStatus {
    /// Whether no further transitions are permitted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Fix | Self::Stopped | Self::Error)
    }

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Float => "float",
            Self::Single => "single",
            Self::Fix => "fix",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory record of one engine run for a rover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Identifier of this run; a restart for the same serial gets a new one.
    pub run_id: String,
    /// Rover serial; immutable.
    pub serial: String,
    /// Rover display name.
    pub rover_name: String,
    /// Generated engine configuration.
    pub config_path: PathBuf,
    /// Engine solution output.
    pub output_path: PathBuf,
    /// Current quality status.
    pub status: SessionStatus,
    /// Converged position, set once on entering `Fix`.
    pub coordinates: Option<FixedPosition>,
    /// Diagnostic for the `Error` status.
    pub error: Option<String>,
    /// Creation timestamp.
    pub start_time: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a session in the `Starting` state.
    #[must_use]
    pub fn new(
        serial: String,
        rover_name: String,
        config_path: PathBuf,
        output_path: PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            serial,
            rover_name,
            config_path,
            output_path,
            status: SessionStatus::Starting,
            coordinates: None,
            error: None,
            start_time: now,
            updated_at: now,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::{Error, Fix, Float, Running, Single, Starting, Stopped};

        matches!(
            (self.status, next),
            (Starting, Running)
                | (Starting | Running | Float | Single, Float | Single | Stopped | Error)
                | (Running | Float | Single, Fix)
        ) && self.status != next
    }

    /// Apply a transition if permitted; returns whether it was applied.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Enter `Fix` and record the converged position.
    ///
    /// Returns `false` without touching the session if the transition is not
    /// permitted or a position was already recorded.
    pub fn record_fix(&mut self, position: FixedPosition) -> bool {
        if self.coordinates.is_some() || !self.transition(SessionStatus::Fix) {
            return false;
        }
        self.coordinates = Some(position);
        true
    }

    /// Enter `Error` with a diagnostic message.
    pub fn record_error(&mut self, message: String) -> bool {
        if !self.transition(SessionStatus::Error) {
            return false;
        }
        self.error = Some(message);
        true
    }
}
