//! A non-blocking activity log.
//!
//! Producers push lines into a bounded queue and never wait: when the queue
//! is full the line is dropped. A background task drains the queue into a
//! capped in-memory buffer that readers copy from.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

/// One activity log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the line was produced.
    pub timestamp: DateTime<Utc>,
    /// The line itself.
    pub message: String,
}

/// Bounded, drop-on-overflow activity log.
#[derive(Debug)]
pub struct LogSink {
    sender: mpsc::Sender<LogEntry>,
    lines: Arc<RwLock<VecDeque<LogEntry>>>,
    dropped: AtomicU64,
    cancellation_token: CancellationToken,
}

impl LogSink {
    /// Creates the sink and spawns its drain task on the current runtime.
    pub fn start(max_lines: usize, queue_capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<LogEntry>(queue_capacity.max(1));
        let lines = Arc::new(RwLock::new(VecDeque::with_capacity(max_lines)));
        let cancellation_token = CancellationToken::new();

        let drain_lines = Arc::clone(&lines);
        let drain_token = cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = drain_token.cancelled() => break,
                    entry = receiver.recv() => {
                        let Some(entry) = entry else { break };
                        let mut lines = drain_lines.write().await;
                        lines.push_back(entry);
                        while lines.len() > max_lines {
                            lines.pop_front();
                        }
                    }
                }
            }
            tracing::debug!("Activity log drain stopped.");
        });

        Self { sender, lines, dropped: AtomicU64::new(0), cancellation_token }
    }

    /// Queues a line without blocking. The line is dropped when the queue is
    /// full or the sink is stopped.
    pub fn add(&self, message: impl Into<String>) {
        let entry = LogEntry { timestamp: Utc::now(), message: message.into() };
        if self.sender.try_send(entry).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Activity log queue full or closed, dropping line.");
        }
    }

    /// A copy of the buffered lines, oldest first.
    pub async fn get_logs(&self) -> Vec<LogEntry> {
        self.lines.read().await.iter().cloned().collect()
    }

    /// Number of lines dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops the drain task. Lines still queued are lost.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
