//! Byte-level line assembly for child process output.
//!
//! Game servers are not guaranteed to emit valid UTF-8 (world names, plugin
//! output, locale-dependent banners), and `BufReader::lines()` kills the
//! whole read loop on the first bad sequence. Reads here stay at the byte
//! level and each completed line is decoded lossily, so a stray byte costs
//! one replacement character instead of the reader task.

use std::sync::Arc;

use cubed_core::ConsoleSource;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::buffer::ConsoleBuffer;

/// Read buffer size for each output stream.
const READ_CHUNK: usize = 4096;

/// Accumulates raw output chunks and yields completed lines.
///
/// Chunk boundaries carry no meaning: a line split across reads, even in
/// the middle of a multi-byte sequence, is reassembled before decoding.
/// A carriage return immediately before the newline is stripped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    /// Create an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for piece in chunk.split_inclusive(|&b| b == b'\n') {
            if piece.last() == Some(&b'\n') {
                self.partial.extend_from_slice(&piece[..piece.len() - 1]);
                lines.push(self.take_partial());
            } else {
                self.partial.extend_from_slice(piece);
            }
        }
        lines
    }

    /// Flush the trailing unterminated line, if any.
    ///
    /// Called once at end of stream so final output without a newline is
    /// not dropped.
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(self.take_partial())
        }
    }

    fn take_partial(&mut self) -> String {
        if self.partial.last() == Some(&b'\r') {
            self.partial.pop();
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        line
    }
}

/// Spawn a task that drains one output stream into the console buffer.
///
/// The task runs until the stream hits EOF (the child exited and the write
/// end of the pipe closed) or a read error. One unit is pushed into `ready`
/// for each decoded line; the supervisor uses the first as its readiness
/// signal and ignores the rest.
pub(crate) fn spawn_console_reader<R>(
    stream: R,
    source: ConsoleSource,
    buffer: Arc<ConsoleBuffer>,
    ready: mpsc::Sender<()>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        let mut splitter = LineSplitter::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&chunk[..n]) {
                        buffer.append(source, line);
                        let _ = ready.try_send(());
                    }
                }
                Err(e) => {
                    debug!(source = %source, error = %e, "console read failed; stopping reader");
                    break;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            buffer.append(source, line);
            let _ = ready.try_send(());
        }
        debug!(source = %source, "console reader finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"first\nsecond\nthird\n");
        assert_eq!(lines, vec!["first", "second", "third"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"Server st").is_empty());
        assert_eq!(splitter.push(b"arted\n"), vec!["Server started"]);
    }

    #[test]
    fn test_multibyte_sequence_split_across_chunks() {
        // "héllo\n" with the chunk boundary inside the two-byte é
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(&[0x68, 0xC3]).is_empty());
        assert_eq!(splitter.push(&[0xA9, 0x6C, 0x6C, 0x6F, b'\n']), vec!["héllo"]);
    }

    #[test]
    fn test_crlf_is_normalized() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"one\r\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_fatal() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(&[b'o', b'k', b'\n', 0xFF, 0xFE, b'\n', b'l', b'a', b't', b'e', b'r', b'\n']);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ok");
        assert_eq!(lines[1], "\u{FFFD}\u{FFFD}");
        assert_eq!(lines[2], "later");
    }

    #[test]
    fn test_empty_lines_are_preserved() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_finish_flushes_trailing_partial() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"done\nno newline"), vec!["done"]);
        assert_eq!(splitter.finish(), Some("no newline".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_chunk_boundaries_never_drop_or_duplicate_bytes() {
        let input = b"alpha\nbeta\ngamma\ndelta";
        for chunk_size in [1, 2, 3, 7, input.len()] {
            let mut splitter = LineSplitter::new();
            let mut lines = Vec::new();
            for chunk in input.chunks(chunk_size) {
                lines.extend(splitter.push(chunk));
            }
            lines.extend(splitter.finish());
            assert_eq!(
                lines.join("\n").as_bytes(),
                input,
                "chunk size {chunk_size} corrupted the stream"
            );
        }
    }

    #[tokio::test]
    async fn test_reader_reassembles_scripted_chunks() {
        let stream = tokio_test::io::Builder::new()
            .read(b"Server st")
            .read(b"arted\npla")
            .read(b"yer joined")
            .build();
        let buffer = Arc::new(ConsoleBuffer::new(16));
        let (ready_tx, mut ready_rx) = mpsc::channel(1);

        spawn_console_reader(stream, ConsoleSource::Stdout, Arc::clone(&buffer), ready_tx)
            .await
            .unwrap();

        let lines: Vec<String> = buffer.snapshot().into_iter().map(|l| l.text).collect();
        assert_eq!(lines, vec!["Server started", "player joined"]);
        // Readiness fired on the first line; later signals were dropped.
        assert!(ready_rx.try_recv().is_ok());
        assert!(ready_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reader_tags_stream_source() {
        let stream = tokio_test::io::Builder::new().read(b"warning: low memory\n").build();
        let buffer = Arc::new(ConsoleBuffer::new(16));
        let (ready_tx, _ready_rx) = mpsc::channel(1);

        spawn_console_reader(stream, ConsoleSource::Stderr, Arc::clone(&buffer), ready_tx)
            .await
            .unwrap();

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].source, ConsoleSource::Stderr);
    }
}
