//! Server lifecycle state.
//!
//! The supervisor publishes exactly one of these values at any time and
//! consumers must treat it as the sole source of truth for the child
//! process lifecycle. Transitions only move forward through a run
//! (`Stopped -> Starting -> Running -> Stopping -> Stopped`); a crash is
//! reported as `Crashed` and immediately settles back to `Stopped`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the supervised server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ServerState {
    /// No child process exists
    Stopped,
    /// Child spawned, waiting for the readiness signal
    Starting,
    /// Child is up and accepting console commands
    Running,
    /// Graceful shutdown requested, grace timer armed
    Stopping,
    /// Child exited without a stop request; carries the exit code
    Crashed {
        /// Exit code, or `128 + signal` for signal deaths on unix.
        code: i32,
    },
}

impl ServerState {
    /// Whether a child process currently exists for this state.
    ///
    /// `Crashed` is not active: the process is already gone by the time
    /// the state is published.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Whether console commands may be delivered in this state.
    #[must_use]
    pub const fn accepts_commands(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Crashed { code } => write!(f, "crashed (exit code {code})"),
        }
    }
}
