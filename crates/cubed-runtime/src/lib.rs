//! Process supervision and console bridging for cubed.
//!
//! This crate turns a server binary on disk into a supervised child
//! process with a usable console:
//!
//! - [`ServerSupervisor`] owns the lifecycle (start, stop with graceful
//!   escalation, restart) and publishes state through a watch channel and
//!   the `ServerEvents` observer port.
//! - [`ConsoleBuffer`] keeps a bounded history of decoded output lines and
//!   multicasts new ones to any number of [`ConsoleFeed`] subscribers.
//! - Commands are written to the child's stdin through a serialized queue
//!   with per-command delivery verdicts.
//!
//! The child is killed (not orphaned) if the supervisor is dropped without
//! a stop; spawns use `kill_on_drop` as the last line of defense.

pub mod console;
pub mod supervisor;

pub use console::{ConsoleBuffer, ConsoleFeed, LineSplitter};
#[cfg(unix)]
pub use supervisor::process_exists;
pub use supervisor::ServerSupervisor;
