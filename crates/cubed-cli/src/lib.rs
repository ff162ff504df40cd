//! cubed - process supervision and console bridging for game servers.
//!
//! This crate is the CLI adapter: argument parsing, the composition
//! root, and the command handlers. Supervision itself lives in
//! `cubed-runtime`, with the domain model in `cubed-core`.

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliContext, bootstrap};
pub use commands::{Commands, LaunchArgs};
pub use parser::Cli;
