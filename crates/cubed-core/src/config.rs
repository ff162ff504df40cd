//! Supervisor launch configuration.
//!
//! Pure configuration data with no infrastructure dependencies. The runtime
//! crate consumes a [`ServerConfig`] when spawning the server process;
//! callers build one with the `with_*` methods and may run [`ServerConfig::validate`]
//! before handing it over.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default number of console lines retained in memory.
pub const DEFAULT_LOG_CAPACITY: usize = 5000;

/// Default grace period between a stop request and a forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default console command used to request a graceful shutdown.
pub const DEFAULT_STOP_COMMAND: &str = "stop";

/// How the supervisor decides the server has finished starting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadySignal {
    /// Ready once the first line of output appears on either stream.
    ///
    /// This is the right default for game servers, which print a banner
    /// almost immediately after the process comes up.
    #[default]
    FirstOutput,
    /// Ready as soon as the process has been spawned.
    ///
    /// For binaries that stay silent until they receive input.
    Immediate,
}

/// Configuration for launching the supervised server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the server executable.
    pub executable: PathBuf,
    /// Working directory for the child; defaults to the executable's parent.
    pub working_dir: Option<PathBuf>,
    /// Arguments passed to the server binary.
    pub args: Vec<String>,
    /// Extra environment variables layered over the inherited environment.
    pub env: HashMap<String, String>,
    /// Console command written to stdin on graceful stop.
    ///
    /// `None` skips the console attempt and goes straight to the
    /// termination signal.
    pub stop_command: Option<String>,
    /// How long a graceful stop may take before the process is killed.
    pub grace_period: Duration,
    /// Readiness detection mode.
    pub ready_signal: ReadySignal,
    /// Number of console lines retained for late subscribers.
    pub log_capacity: usize,
}

impl ServerConfig {
    /// Create a configuration with defaults for everything but the executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            args: Vec::new(),
            env: HashMap::new(),
            stop_command: Some(DEFAULT_STOP_COMMAND.to_string()),
            grace_period: DEFAULT_GRACE_PERIOD,
            ready_signal: ReadySignal::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the graceful stop console command.
    #[must_use]
    pub fn with_stop_command(mut self, command: impl Into<String>) -> Self {
        self.stop_command = Some(command.into());
        self
    }

    /// Disable the console stop command; stop goes straight to a signal.
    #[must_use]
    pub fn without_stop_command(mut self) -> Self {
        self.stop_command = None;
        self
    }

    /// Set the grace period for stops.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the readiness detection mode.
    #[must_use]
    pub const fn with_ready_signal(mut self, signal: ReadySignal) -> Self {
        self.ready_signal = signal;
        self
    }

    /// Set the console history capacity.
    #[must_use]
    pub const fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Working directory the child will actually run in.
    ///
    /// Falls back to the executable's parent directory when none was set.
    #[must_use]
    pub fn resolved_working_dir(&self) -> Option<&Path> {
        self.working_dir
            .as_deref()
            .or_else(|| self.executable.parent())
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Validate configuration shape.
    ///
    /// Filesystem checks (does the executable exist) are deliberately left
    /// to spawn time; a config is often built before the server binary has
    /// been unpacked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.as_os_str().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        if let Some(cmd) = &self.stop_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::BlankStopCommand);
            }
            if cmd.contains(['\n', '\r']) {
                return Err(ConfigError::MultilineStopCommand);
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Server executable path cannot be empty")]
    EmptyExecutable,

    #[error("Console history capacity must be at least 1 line")]
    ZeroLogCapacity,

    #[error("Stop command cannot be blank; use without_stop_command to disable it")]
    BlankStopCommand,

    #[error("Stop command must be a single line")]
    MultilineStopCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new("/srv/cuberite/Cuberite");
        assert_eq!(config.stop_command.as_deref(), Some("stop"));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.ready_signal, ReadySignal::FirstOutput);
        assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = ServerConfig::new("/srv/bin/server")
            .with_working_dir("/srv/world")
            .with_args(["--port", "25565"])
            .with_env("LD_LIBRARY_PATH", "/srv/lib")
            .with_stop_command("shutdown")
            .with_grace_period(Duration::from_secs(10))
            .with_log_capacity(200);

        assert_eq!(config.working_dir.as_deref(), Some(Path::new("/srv/world")));
        assert_eq!(config.args, vec!["--port", "25565"]);
        assert_eq!(config.env.get("LD_LIBRARY_PATH").unwrap(), "/srv/lib");
        assert_eq!(config.stop_command.as_deref(), Some("shutdown"));
        assert_eq!(config.grace_period, Duration::from_secs(10));
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn test_resolved_working_dir_falls_back_to_executable_parent() {
        let config = ServerConfig::new("/srv/cuberite/Cuberite");
        assert_eq!(
            config.resolved_working_dir(),
            Some(Path::new("/srv/cuberite"))
        );

        let config = config.with_working_dir("/elsewhere");
        assert_eq!(config.resolved_working_dir(), Some(Path::new("/elsewhere")));
    }

    #[test]
    fn test_bare_executable_has_no_fallback_dir() {
        let config = ServerConfig::new("Cuberite");
        assert_eq!(config.resolved_working_dir(), None);
    }

    #[test]
    fn test_validate_rejects_empty_executable() {
        let config = ServerConfig::new("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyExecutable));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = ServerConfig::new("/srv/bin/server").with_log_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroLogCapacity));
    }

    #[test]
    fn test_validate_rejects_bad_stop_commands() {
        let config = ServerConfig::new("/srv/bin/server").with_stop_command("  ");
        assert_eq!(config.validate(), Err(ConfigError::BlankStopCommand));

        let config = ServerConfig::new("/srv/bin/server").with_stop_command("stop\nsave-all");
        assert_eq!(config.validate(), Err(ConfigError::MultilineStopCommand));

        let config = ServerConfig::new("/srv/bin/server").without_stop_command();
        assert!(config.validate().is_ok());
    }
}
