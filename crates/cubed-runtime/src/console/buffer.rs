//! Bounded console history with live multicast.

use std::collections::VecDeque;
use std::sync::RwLock;

use cubed_core::{ConsoleLine, ConsoleSource};
use futures_util::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the live broadcast channel.
///
/// A subscriber that falls further behind than this loses the overflow
/// (logged and skipped); the retained history stays available through
/// `snapshot()`.
const BROADCAST_CAPACITY: usize = 1024;

/// Bounded FIFO of recent console lines plus a broadcast for live delivery.
///
/// Appends evict the oldest line once `capacity` is reached, so memory use
/// is flat no matter how chatty the server is. A subscription observes
/// every line exactly once: the history copy and the live receiver are
/// taken under the same lock that appends hold, which makes the cutover
/// point exact.
pub struct ConsoleBuffer {
    inner: RwLock<Inner>,
    live: broadcast::Sender<ConsoleLine>,
    capacity: usize,
}

struct Inner {
    lines: VecDeque<ConsoleLine>,
    next_seq: u64,
}

impl ConsoleBuffer {
    /// Create a buffer retaining at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (live, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                lines: VecDeque::with_capacity(capacity),
                next_seq: 0,
            }),
            live,
            capacity,
        }
    }

    /// Append one line, assigning it the next sequence number.
    pub fn append(&self, source: ConsoleSource, text: impl Into<String>) {
        let mut inner = self.inner.write().unwrap();
        let line = ConsoleLine::new(inner.next_seq, source, text);
        inner.next_seq += 1;
        if inner.lines.len() >= self.capacity {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line.clone());
        // Sent while the write lock is held so subscribe() cannot observe a
        // line in both the history copy and the live receiver.
        let _ = self.live.send(line);
    }

    /// Copy of the retained history, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConsoleLine> {
        self.inner.read().unwrap().lines.iter().cloned().collect()
    }

    /// Subscribe to the retained history followed by live lines.
    #[must_use]
    pub fn subscribe(&self) -> ConsoleFeed {
        let inner = self.inner.read().unwrap();
        let receiver = self.live.subscribe();
        ConsoleFeed {
            backlog: inner.lines.clone(),
            receiver,
        }
    }

    /// Drop all retained lines.
    ///
    /// Sequence numbers keep rising across a clear, so lines observed
    /// before and after still compare correctly.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        let dropped = inner.lines.len();
        inner.lines.clear();
        if dropped > 0 {
            debug!(dropped, "console history cleared");
        }
    }

    /// Number of retained lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().lines.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.live.receiver_count()
    }
}

/// A console subscription: buffered history first, then live lines.
///
/// Obtained from [`ConsoleBuffer::subscribe`]. Dropping the feed
/// unsubscribes.
pub struct ConsoleFeed {
    backlog: VecDeque<ConsoleLine>,
    receiver: broadcast::Receiver<ConsoleLine>,
}

impl ConsoleFeed {
    /// Next line in order. Returns `None` once the buffer is gone and all
    /// pending lines have been consumed.
    pub async fn next(&mut self) -> Option<ConsoleLine> {
        if let Some(line) = self.backlog.pop_front() {
            return Some(line);
        }
        loop {
            match self.receiver.recv().await {
                Ok(line) => return Some(line),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "console feed lagged; skipping missed lines");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt the feed into a `Stream` for combinator-style consumers.
    pub fn into_stream(mut self) -> impl Stream<Item = ConsoleLine> {
        async_stream::stream! {
            while let Some(line) = self.next().await {
                yield line;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::Arc;

    fn texts(lines: &[ConsoleLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = ConsoleBuffer::new(8);
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), Vec::new());
        assert_eq!(buffer.subscriber_count(), 0);
    }

    #[test]
    fn test_capacity_eviction_keeps_newest() {
        let buffer = ConsoleBuffer::new(100);
        for i in 1..=150 {
            buffer.append(ConsoleSource::Stdout, format!("line {i}"));
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(snapshot.first().unwrap().text, "line 51");
        assert_eq!(snapshot.last().unwrap().text, "line 150");
        // Sequence numbers reflect the append order, not the buffer slot.
        assert_eq!(snapshot.first().unwrap().seq, 50);
        assert_eq!(snapshot.last().unwrap().seq, 149);
    }

    #[tokio::test]
    async fn test_subscribe_yields_history_then_live() {
        let buffer = ConsoleBuffer::new(16);
        buffer.append(ConsoleSource::Stdout, "a");
        buffer.append(ConsoleSource::Stderr, "b");

        let mut feed = buffer.subscribe();
        buffer.append(ConsoleSource::Stdout, "c");

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(feed.next().await.unwrap());
        }
        assert_eq!(texts(&seen), vec!["a", "b", "c"]);
        assert_eq!(seen.iter().map(|l| l.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_every_line_is_observed_exactly_once() {
        let buffer = Arc::new(ConsoleBuffer::new(500));
        let writer = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                for i in 0..200u32 {
                    buffer.append(ConsoleSource::Stdout, format!("line {i}"));
                    if i % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        tokio::task::yield_now().await;

        // Subscribe somewhere in the middle of the append storm.
        let mut feed = buffer.subscribe();
        writer.await.unwrap();

        let mut seqs = Vec::new();
        loop {
            let line = feed.next().await.unwrap();
            seqs.push(line.seq);
            if line.seq == 199 {
                break;
            }
        }
        // No duplicates, no gaps from the first observed line onward.
        let expected: Vec<u64> = (seqs[0]..=199).collect();
        assert_eq!(seqs, expected);
    }

    #[tokio::test]
    async fn test_two_subscribers_agree_on_order() {
        let buffer = ConsoleBuffer::new(16);
        buffer.append(ConsoleSource::Stdout, "first");
        let mut early = buffer.subscribe();
        buffer.append(ConsoleSource::Stdout, "second");
        let mut late = buffer.subscribe();
        buffer.append(ConsoleSource::Stdout, "third");

        let mut early_seen = Vec::new();
        for _ in 0..3 {
            early_seen.push(early.next().await.unwrap().seq);
        }
        let mut late_seen = Vec::new();
        for _ in 0..3 {
            late_seen.push(late.next().await.unwrap().seq);
        }
        assert_eq!(early_seen, vec![0, 1, 2]);
        assert_eq!(late_seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_clear_preserves_sequence_numbers() {
        let buffer = ConsoleBuffer::new(16);
        buffer.append(ConsoleSource::Stdout, "old");
        buffer.append(ConsoleSource::Stdout, "older");
        buffer.clear();
        assert!(buffer.is_empty());

        buffer.append(ConsoleSource::Stdout, "new");
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].seq, 2);
    }

    #[tokio::test]
    async fn test_feed_ends_when_buffer_dropped() {
        let buffer = ConsoleBuffer::new(4);
        buffer.append(ConsoleSource::Stdout, "only");
        let mut feed = buffer.subscribe();
        drop(buffer);

        assert_eq!(feed.next().await.unwrap().text, "only");
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream_adapter() {
        let buffer = ConsoleBuffer::new(4);
        buffer.append(ConsoleSource::Stdout, "x");
        buffer.append(ConsoleSource::Stdout, "y");
        let feed = buffer.subscribe();
        drop(buffer);

        let collected: Vec<String> = feed.into_stream().map(|l| l.text).collect().await;
        assert_eq!(collected, vec!["x", "y"]);
    }
}
