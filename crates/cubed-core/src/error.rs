//! Error taxonomy for supervision operations.
//!
//! Lifecycle errors ([`SupervisorError`]) and command delivery errors
//! ([`CommandError`]) are separate types because their audiences differ:
//! lifecycle errors end a control operation, command errors are routine
//! feedback for an interactive console.

use thiserror::Error;

/// Errors from lifecycle operations (start/stop/restart).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// The OS-level spawn failed. No state change has occurred; the
    /// supervisor is still `Stopped` and `start()` may be retried.
    #[error("Failed to spawn server process: {reason}")]
    SpawnFailed {
        /// Underlying OS error text.
        reason: String,
    },

    /// Supervisor bookkeeping failed in a way that is not the child's fault.
    #[error("Internal supervisor error: {reason}")]
    Internal {
        /// What went wrong.
        reason: String,
    },
}

impl SupervisorError {
    /// Build a `SpawnFailed` from any displayable cause.
    pub fn spawn_failed(reason: impl ToString) -> Self {
        Self::SpawnFailed {
            reason: reason.to_string(),
        }
    }

    /// Build an `Internal` from any displayable cause.
    pub fn internal(reason: impl ToString) -> Self {
        Self::Internal {
            reason: reason.to_string(),
        }
    }
}

/// Errors from console command delivery.
///
/// An unsolicited child exit is not represented here: it is a state
/// transition (`Crashed`), not an operation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The server is not in the `Running` state; nothing was written.
    #[error("Server is not running")]
    NotRunning,

    /// The command was accepted but could not be written to stdin.
    #[error("Failed to deliver command to server stdin: {reason}")]
    DeliveryFailed {
        /// Underlying write error text.
        reason: String,
    },

    /// The command text itself is unusable (blank, or spans lines).
    #[error("Invalid console command: {reason}")]
    InvalidCommand {
        /// Why the text was rejected.
        reason: String,
    },
}

impl CommandError {
    /// Build a `DeliveryFailed` from any displayable cause.
    pub fn delivery_failed(reason: impl ToString) -> Self {
        Self::DeliveryFailed {
            reason: reason.to_string(),
        }
    }

    /// Build an `InvalidCommand` from any displayable cause.
    pub fn invalid(reason: impl ToString) -> Self {
        Self::InvalidCommand {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SupervisorError::spawn_failed("No such file or directory (os error 2)");
        assert_eq!(
            err.to_string(),
            "Failed to spawn server process: No such file or directory (os error 2)"
        );

        assert_eq!(CommandError::NotRunning.to_string(), "Server is not running");

        let err = CommandError::delivery_failed("Broken pipe (os error 32)");
        assert!(err.to_string().contains("Broken pipe"));
    }

    #[test]
    fn test_command_errors_compare() {
        assert_eq!(CommandError::NotRunning, CommandError::NotRunning);
        assert_ne!(
            CommandError::NotRunning,
            CommandError::delivery_failed("pipe closed")
        );
    }
}
