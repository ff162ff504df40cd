//! Command definitions and launch arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use cubed_core::{ReadySignal, ServerConfig};

/// Available commands for the cubed supervisor.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the server and attach an interactive console
    Run(LaunchArgs),

    /// Validate the launch configuration and exit
    Check(LaunchArgs),
}

/// Arguments describing how to launch the server process.
#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
    /// Path to the server executable
    #[arg(long, env = "CUBED_SERVER_EXECUTABLE", value_name = "PATH")]
    pub executable: PathBuf,

    /// Working directory for the server (defaults to the executable's directory)
    #[arg(long, env = "CUBED_SERVER_DIR", value_name = "DIR")]
    pub server_dir: Option<PathBuf>,

    /// Extra argument passed to the server binary (repeatable)
    #[arg(long = "server-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// Console command that asks the server to shut down cleanly
    #[arg(long, default_value = cubed_core::DEFAULT_STOP_COMMAND)]
    pub stop_command: String,

    /// Skip the console stop command and terminate with a signal instead
    #[arg(long)]
    pub no_stop_command: bool,

    /// Seconds to wait for a clean exit before force-killing
    #[arg(long, default_value_t = cubed_core::DEFAULT_GRACE_PERIOD.as_secs())]
    pub grace_secs: u64,

    /// Console lines kept in memory for late subscribers
    #[arg(long, default_value_t = cubed_core::DEFAULT_LOG_CAPACITY)]
    pub log_lines: usize,

    /// Treat the server as running immediately instead of waiting for output
    #[arg(long)]
    pub ready_immediately: bool,
}

impl LaunchArgs {
    /// Convert parsed arguments into a supervisor configuration.
    #[must_use]
    pub fn to_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(&self.executable)
            .with_args(self.server_args.iter().cloned())
            .with_grace_period(Duration::from_secs(self.grace_secs))
            .with_log_capacity(self.log_lines);
        if let Some(dir) = &self.server_dir {
            config = config.with_working_dir(dir);
        }
        config = if self.no_stop_command {
            config.without_stop_command()
        } else {
            config.with_stop_command(&self.stop_command)
        };
        if self.ready_immediately {
            config = config.with_ready_signal(ReadySignal::Immediate);
        }
        config
    }
}
