//! Console output pipeline: line assembly, bounded history, live feeds.

mod buffer;
mod lines;

pub use buffer::{ConsoleBuffer, ConsoleFeed};
pub use lines::LineSplitter;
pub(crate) use lines::spawn_console_reader;
