//! Append-only event log (C14). `Ledger` is the minimal trait; the
//! write-behind wrapper buffers appends and guarantees read-your-writes by
//! flushing (or reading through the pending map) before every read.

use crate::error::{EngineError, Result};
use crate::model::LedgerEntry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use uuid::Uuid;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<u64>;
    async fn get_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>>;
    async fn range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<LedgerEntry>>;
    /// Rewrites storage while preserving ordering and reference integrity;
    /// never mutates already-returned entries' `seq`.
    async fn compact(&self) -> Result<()>;
}

/// In-process append-only backing store. `seq` is assigned from a single
/// atomic counter so it is strictly increasing and gap-free within this
/// process.
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    next_seq: AtomicU64,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, mut entry: LedgerEntry) -> Result<u64> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        entry.seq = seq;
        self.entries.lock().push(entry);
        Ok(seq)
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        Ok(self.entries.lock().iter().find(|e| e.id == id).cloned())
    }

    async fn range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.seq >= from_seq && e.seq <= to_seq)
            .cloned()
            .collect())
    }

    async fn compact(&self) -> Result<()> {
        Ok(())
    }
}

/// Wraps an underlying [`Ledger`]: `append` buffers into a pending map, a
/// periodic task flushes it, and every read merges pending writes with the
/// underlying store so callers always observe their own writes.
pub struct WriteBehindLedger {
    inner: Arc<dyn Ledger>,
    pending: Mutex<HashMap<Uuid, LedgerEntry>>,
    pending_order: Mutex<Vec<Uuid>>,
    flush_interval: Duration,
}

impl WriteBehindLedger {
    pub fn new(inner: Arc<dyn Ledger>, flush_interval: Duration) -> Self {
        Self {
            inner,
            pending: Mutex::new(HashMap::new()),
            pending_order: Mutex::new(Vec::new()),
            flush_interval,
        }
    }

    /// Flushes every pending entry into the underlying ledger, preserving
    /// append order.
    pub async fn flush(&self) -> Result<()> {
        let ids: Vec<Uuid> = {
            let mut order = self.pending_order.lock();
            std::mem::take(&mut *order)
        };
        for id in ids {
            let entry = { self.pending.lock().remove(&id) };
            if let Some(entry) = entry {
                self.inner.append(entry).await?;
            }
        }
        Ok(())
    }

    /// Spawns a background task that flushes on `flush_interval`. The
    /// returned handle should be aborted on shutdown.
    pub fn spawn_flush_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        let period = this.flush_interval;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = this.flush().await {
                    tracing::warn!(error = %e, "write-behind ledger periodic flush failed");
                }
            }
        })
    }
}

#[async_trait]
impl Ledger for WriteBehindLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<u64> {
        // Pending entries get a locally-visible seq of 0 until flushed;
        // callers needing the authoritative seq should await `flush()`
        // first, matching the "all read operations flush first" contract
        // for get/range below.
        let id = entry.id;
        self.pending.lock().insert(id, entry);
        self.pending_order.lock().push(id);
        Ok(0)
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        if let Some(entry) = self.pending.lock().get(&id).cloned() {
            return Ok(Some(entry));
        }
        self.inner.get_entry(id).await
    }

    async fn range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<LedgerEntry>> {
        self.flush().await?;
        self.inner.range(from_seq, to_seq).await
    }

    async fn compact(&self) -> Result<()> {
        self.flush().await?;
        self.inner.compact().await
    }
}

pub fn ledger_not_found(id: Uuid) -> EngineError {
    EngineError::storage(format!("ledger entry {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    fn entry(kind: &str) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            seq: 0,
            timestamp: Utc::now(),
            kind: kind.to_string(),
            actor: "indexer".to_string(),
            description: "test".to_string(),
            impacted_files: vec![],
            impacted_entities: vec![],
            metadata: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn seq_is_strictly_increasing_and_gap_free() {
        let ledger = InMemoryLedger::new();
        let a = ledger.append(entry("index:file:added")).await.unwrap();
        let b = ledger.append(entry("index:file:modified")).await.unwrap();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn write_behind_ledger_reads_its_own_pending_writes() {
        let inner = Arc::new(InMemoryLedger::new());
        let wb = WriteBehindLedger::new(inner, Duration::from_secs(60));
        let e = entry("index:file:added");
        let id = e.id;
        wb.append(e).await.unwrap();
        let found = wb.get_entry(id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn range_flushes_pending_before_reading() {
        let inner = Arc::new(InMemoryLedger::new());
        let wb = WriteBehindLedger::new(inner.clone(), Duration::from_secs(60));
        wb.append(entry("index:file:added")).await.unwrap();
        let rows = wb.range(0, u64::MAX).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
