//! CLI bootstrap - the composition root.
//!
//! The single place where the CLI wires infrastructure together: the
//! launch configuration is validated, the supervisor is constructed and
//! the lifecycle observer attached. Handlers receive the composed
//! context and never build these pieces themselves.

use std::sync::Arc;

use anyhow::Result;
use cubed_core::{ServerConfig, ServerEvents};
use cubed_runtime::ServerSupervisor;

/// Fully composed context handed to CLI command handlers.
pub struct CliContext {
    /// The supervisor owning the server process.
    pub supervisor: Arc<ServerSupervisor>,
}

/// Compose the CLI context from a launch configuration.
pub fn bootstrap(config: ServerConfig, events: Arc<dyn ServerEvents>) -> Result<CliContext> {
    config.validate()?;
    let supervisor = Arc::new(ServerSupervisor::with_events(config, events));
    Ok(CliContext { supervisor })
}
