//! Core domain types and port definitions for cubed.
//!
//! This crate holds the pure domain: lifecycle state, console line types,
//! launch configuration, the error taxonomy, and the observer port. It has
//! no async runtime and no OS-level dependencies; everything that touches a
//! real process lives in `cubed-runtime`.

pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod state;

pub use config::{
    ConfigError, DEFAULT_GRACE_PERIOD, DEFAULT_LOG_CAPACITY, DEFAULT_STOP_COMMAND, ReadySignal,
    ServerConfig,
};
pub use console::{ConsoleLine, ConsoleSource};
pub use error::{CommandError, SupervisorError};
pub use events::{NoopServerEvents, ServerEvents};
pub use state::ServerState;
