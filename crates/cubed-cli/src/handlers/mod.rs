//! Command handlers for the CLI.

pub mod check;
pub mod run;
