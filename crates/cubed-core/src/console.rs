//! Console line domain types.
//!
//! A [`ConsoleLine`] is one decoded line of child process output. Lines are
//! numbered with a sequence counter that rises monotonically for the life of
//! the supervisor, so any two observers agree on the relative order of lines
//! they have both seen, regardless of when they subscribed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which output stream a console line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleSource {
    /// Child process standard output
    Stdout,
    /// Child process standard error
    Stderr,
}

impl ConsoleSource {
    /// Stream name as it appears in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for ConsoleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of console output from the supervised server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    /// Position in the global output order (monotone, never reused).
    pub seq: u64,
    /// Stream the line was read from.
    pub source: ConsoleSource,
    /// Decoded line text, without the trailing newline.
    pub text: String,
}

impl ConsoleLine {
    /// Create a new console line.
    pub fn new(seq: u64, source: ConsoleSource, text: impl Into<String>) -> Self {
        Self {
            seq,
            source,
            text: text.into(),
        }
    }
}

impl fmt::Display for ConsoleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.text)
    }
}
