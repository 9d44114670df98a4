//! Typed persistent relational + vector store with transactional semantics.
//!
//! `GraphStore` is the `#[async_trait]` contract the rest of the crate
//! consumes: callers never build SQL-shaped strings by hand, values travel
//! as [`QueryValue`] so nothing user-supplied is ever interpolated into a
//! query script, matching the discipline [`crate::query_sanitization`]
//! already enforces for free-text search terms.
//!
//! The in-memory implementation backs tests and small projects; anything
//! durable is expected to implement the same trait over a real engine.

use crate::error::{EngineError, Result};
use crate::types::ValidatedDocumentId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A parameter value passed into a [`QueryScript`]. Never a raw string
/// spliced into the script text.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Id(ValidatedDocumentId),
    Vector(Vec<f32>),
    List(Vec<QueryValue>),
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Int(v)
    }
}

impl From<ValidatedDocumentId> for QueryValue {
    fn from(v: ValidatedDocumentId) -> Self {
        QueryValue::Id(v)
    }
}

/// Opaque handle over the store's native query sublanguage. The in-memory
/// store interprets a tiny relational-scan subset; real backends are free
/// to treat this as their own query text as long as `params` stay
/// out-of-band.
#[derive(Debug, Clone)]
pub struct QueryScript {
    pub relation: String,
    pub text: String,
}

impl QueryScript {
    pub fn new(relation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            text: text.into(),
        }
    }
}

pub type QueryParams = HashMap<String, QueryValue>;

/// A single result row: field name -> value.
pub type Row = HashMap<String, QueryValue>;

#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub rows_scanned: usize,
    pub rows_returned: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub stats: QueryStats,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// When true, rows with no existing primary key match are inserted;
    /// rows that do match are overwritten wholesale (upsert semantics).
    pub upsert: bool,
}

/// One candidate returned by `vector_search`, ordered by ascending
/// `distance` (smaller = closer; cosine distance is monotonic).
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: ValidatedDocumentId,
    pub distance: f32,
}

/// Sequential schema migration. `version` must equal the applied count + 1
/// at apply time; `GraphStore::migrate` enforces this.
#[async_trait]
pub trait Migration: Send + Sync {
    fn version(&self) -> u64;
    fn description(&self) -> &str;
    async fn up(&self, store: &dyn GraphStore) -> Result<()>;
}

/// Typed persistent relational + vector store contract consumed by the
/// indexer, query builder, and similarity service.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    /// Read-only evaluation of `script` against `params`.
    async fn query(&self, script: &QueryScript, params: &QueryParams) -> Result<QueryResult>;

    /// Evaluation of `script` for side effects (writes, deletes); returns
    /// the same shape as `query` for affected-row reporting.
    async fn execute(&self, script: &QueryScript, params: &QueryParams) -> Result<QueryResult>;

    /// Upsert `rows` into `relation`, keyed on each row's `id` field.
    async fn write_batch(
        &self,
        relation: &str,
        rows: Vec<Row>,
        options: WriteOptions,
    ) -> Result<usize>;

    /// Delete every row in `relation` matching `id`.
    async fn delete_by_id(&self, relation: &str, id: ValidatedDocumentId) -> Result<usize>;

    /// Delete every row in `relation` whose `field` equals `value`, returning
    /// the `id` of each deleted row. Backs cascading deletes such as
    /// removing a file's entities by `file_id`, or its edges by `from_id`/
    /// `to_id`, without the caller needing to know which rows matched
    /// ahead of time.
    async fn delete_by_field(
        &self,
        relation: &str,
        field: &str,
        value: &QueryValue,
    ) -> Result<Vec<ValidatedDocumentId>>;

    /// k nearest neighbours to `query_vector` by cosine distance.
    async fn vector_search(&self, query_vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    /// Insert or replace the embedding for one entity/model pair.
    async fn upsert_embedding(&self, entity_id: ValidatedDocumentId, vector: Vec<f32>) -> Result<()>;

    /// Look up a previously-stored embedding for direct similarity
    /// computation (used by the similarity service's entity-to-entity
    /// comparisons).
    async fn get_embedding(&self, entity_id: ValidatedDocumentId) -> Result<Option<Vec<f32>>>;

    /// Remove a previously-stored embedding, if any. Cascades alongside
    /// `delete_by_field` when the owning entity is deleted or replaced.
    async fn delete_embedding(&self, entity_id: ValidatedDocumentId) -> Result<()>;

    /// Scoped transaction: `f` observes a consistent snapshot and either
    /// all of its writes land or none do.
    async fn transaction(
        &self,
        f: Box<dyn FnOnce(&dyn GraphStore) -> Result<()> + Send>,
    ) -> Result<()>;

    async fn schema_version(&self) -> Result<u64>;
    async fn set_schema_version(&self, version: u64) -> Result<()>;
    async fn relation_exists(&self, name: &str) -> Result<bool>;

    /// Apply outstanding migrations in `migrations` sequentially. Each
    /// migration's `version()` must equal `schema_version() + 1`; a
    /// migration failure leaves the schema at whatever sub-state the
    /// migration itself left and does not advance the version counter.
    async fn migrate(&self, migrations: &[Box<dyn Migration>]) -> Result<()> {
        for migration in migrations {
            let current = self.schema_version().await?;
            if migration.version() <= current {
                continue;
            }
            if migration.version() != current + 1 {
                return Err(EngineError::storage(format!(
                    "migration {} is out of sequence (current schema version is {current})",
                    migration.version()
                )));
            }
            migration.up(self).await?;
            self.set_schema_version(migration.version()).await?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Relation {
    rows: HashMap<ValidatedDocumentId, Row>,
}

struct EmbeddingRecord {
    vector: Vec<f32>,
}

/// Single-process, lock-guarded implementation of [`GraphStore`] used for
/// tests and small projects. Transactions are emulated by snapshotting
/// relation state before `f` runs and restoring it on error, which is
/// sufficient to honour "all writes land or none do" under the single
/// writer this process admits.
pub struct InMemoryGraphStore {
    relations: RwLock<HashMap<String, Relation>>,
    embeddings: RwLock<HashMap<ValidatedDocumentId, EmbeddingRecord>>,
    schema_version: AtomicU64,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            embeddings: RwLock::new(HashMap::new()),
            schema_version: AtomicU64::new(0),
        }
    }

    fn row_id(row: &Row) -> Result<ValidatedDocumentId> {
        match row.get("id") {
            Some(QueryValue::Id(id)) => Ok(*id),
            _ => Err(EngineError::invalid_argument(
                "row is missing a QueryValue::Id \"id\" field",
            )),
        }
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            na += x * x;
            nb += y * y;
        }
        if na == 0.0 || nb == 0.0 {
            return 1.0;
        }
        let cosine_similarity = dot / (na.sqrt() * nb.sqrt());
        1.0 - cosine_similarity
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn query(&self, script: &QueryScript, _params: &QueryParams) -> Result<QueryResult> {
        let started = Instant::now();
        let relations = self.relations.read();
        let rows: Vec<Row> = relations
            .get(&script.relation)
            .map(|r| r.rows.values().cloned().collect())
            .unwrap_or_default();
        let stats = QueryStats {
            rows_scanned: rows.len(),
            rows_returned: rows.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        Ok(QueryResult { rows, stats })
    }

    async fn execute(&self, script: &QueryScript, params: &QueryParams) -> Result<QueryResult> {
        self.query(script, params).await
    }

    async fn write_batch(
        &self,
        relation: &str,
        rows: Vec<Row>,
        _options: WriteOptions,
    ) -> Result<usize> {
        let mut relations = self.relations.write();
        let entry = relations.entry(relation.to_string()).or_default();
        let mut written = 0;
        for row in rows {
            let id = Self::row_id(&row)?;
            entry.rows.insert(id, row);
            written += 1;
        }
        Ok(written)
    }

    async fn delete_by_id(&self, relation: &str, id: ValidatedDocumentId) -> Result<usize> {
        let mut relations = self.relations.write();
        if let Some(r) = relations.get_mut(relation) {
            if r.rows.remove(&id).is_some() {
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_by_field(
        &self,
        relation: &str,
        field: &str,
        value: &QueryValue,
    ) -> Result<Vec<ValidatedDocumentId>> {
        let mut relations = self.relations.write();
        let Some(r) = relations.get_mut(relation) else {
            return Ok(Vec::new());
        };
        let mut deleted = Vec::new();
        r.rows.retain(|id, row| {
            let matches = row.get(field).map(|v| v == value).unwrap_or(false);
            if matches {
                deleted.push(*id);
            }
            !matches
        });
        Ok(deleted)
    }

    async fn vector_search(&self, query_vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let embeddings = self.embeddings.read();
        let mut hits: Vec<VectorHit> = embeddings
            .iter()
            .map(|(id, record)| VectorHit {
                id: *id,
                distance: Self::cosine_distance(query_vector, &record.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    async fn upsert_embedding(&self, entity_id: ValidatedDocumentId, vector: Vec<f32>) -> Result<()> {
        self.embeddings
            .write()
            .insert(entity_id, EmbeddingRecord { vector });
        Ok(())
    }

    async fn get_embedding(&self, entity_id: ValidatedDocumentId) -> Result<Option<Vec<f32>>> {
        Ok(self
            .embeddings
            .read()
            .get(&entity_id)
            .map(|record| record.vector.clone()))
    }

    async fn delete_embedding(&self, entity_id: ValidatedDocumentId) -> Result<()> {
        self.embeddings.write().remove(&entity_id);
        Ok(())
    }

    async fn transaction(
        &self,
        f: Box<dyn FnOnce(&dyn GraphStore) -> Result<()> + Send>,
    ) -> Result<()> {
        let snapshot: HashMap<String, Vec<(ValidatedDocumentId, Row)>> = {
            let relations = self.relations.read();
            relations
                .iter()
                .map(|(k, v)| (k.clone(), v.rows.iter().map(|(id, row)| (*id, row.clone())).collect()))
                .collect()
        };
        match f(self) {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut relations = self.relations.write();
                relations.clear();
                for (name, rows) in snapshot {
                    let relation = relations.entry(name).or_default();
                    for (id, row) in rows {
                        relation.rows.insert(id, row);
                    }
                }
                Err(e)
            }
        }
    }

    async fn schema_version(&self) -> Result<u64> {
        Ok(self.schema_version.load(Ordering::SeqCst))
    }

    async fn set_schema_version(&self, version: u64) -> Result<()> {
        self.schema_version.store(version, Ordering::SeqCst);
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> Result<bool> {
        Ok(self.relations.read().contains_key(name))
    }
}

/// Convenience constructor for an in-process store backed by nothing but
/// heap maps, suitable for tests and single-process deployments.
pub fn create_in_memory_store() -> Arc<dyn GraphStore> {
    Arc::new(InMemoryGraphStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: ValidatedDocumentId, name: &str) -> Row {
        let mut row = HashMap::new();
        row.insert("id".to_string(), QueryValue::Id(id));
        row.insert("name".to_string(), QueryValue::Text(name.to_string()));
        row
    }

    #[tokio::test]
    async fn write_batch_then_query_round_trips() {
        let store = InMemoryGraphStore::new();
        let id = ValidatedDocumentId::new();
        store
            .write_batch("entities", vec![row(id, "parse")], WriteOptions { upsert: true })
            .await
            .unwrap();
        let result = store
            .query(&QueryScript::new("entities", "*"), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_field_removes_only_matching_rows_and_reports_their_ids() {
        let store = InMemoryGraphStore::new();
        let file_a = ValidatedDocumentId::new();
        let file_b = ValidatedDocumentId::new();
        let entity_a1 = ValidatedDocumentId::new();
        let entity_a2 = ValidatedDocumentId::new();
        let entity_b1 = ValidatedDocumentId::new();

        let mut row_a1 = row(entity_a1, "a1");
        row_a1.insert("file_id".to_string(), QueryValue::Id(file_a));
        let mut row_a2 = row(entity_a2, "a2");
        row_a2.insert("file_id".to_string(), QueryValue::Id(file_a));
        let mut row_b1 = row(entity_b1, "b1");
        row_b1.insert("file_id".to_string(), QueryValue::Id(file_b));

        store
            .write_batch("entities", vec![row_a1, row_a2, row_b1], WriteOptions { upsert: true })
            .await
            .unwrap();

        let mut deleted = store
            .delete_by_field("entities", "file_id", &QueryValue::Id(file_a))
            .await
            .unwrap();
        deleted.sort();
        let mut expected = vec![entity_a1, entity_a2];
        expected.sort();
        assert_eq!(deleted, expected);

        let remaining = store
            .query(&QueryScript::new("entities", "*"), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(remaining.rows.len(), 1);
    }

    #[tokio::test]
    async fn vector_search_orders_by_ascending_distance() {
        let store = InMemoryGraphStore::new();
        let a = ValidatedDocumentId::new();
        let b = ValidatedDocumentId::new();
        store.upsert_embedding(a, vec![1.0, 0.0]).await.unwrap();
        store.upsert_embedding(b, vec![0.0, 1.0]).await.unwrap();
        let hits = store.vector_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].id, a);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn zero_norm_vector_has_distance_one_not_nan() {
        let store = InMemoryGraphStore::new();
        let a = ValidatedDocumentId::new();
        store.upsert_embedding(a, vec![0.0, 0.0]).await.unwrap();
        let hits = store.vector_search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].distance, 1.0);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let store = InMemoryGraphStore::new();
        let id = ValidatedDocumentId::new();
        store
            .write_batch("entities", vec![row(id, "parse")], WriteOptions { upsert: true })
            .await
            .unwrap();

        let result = store
            .transaction(Box::new(move |_store| Err(EngineError::storage("boom"))))
            .await;
        assert!(result.is_err());
        // Original row is untouched; nothing from the failed closure landed.
        let rows = store
            .query(&QueryScript::new("entities", "*"), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(rows.rows.len(), 1);
    }

    #[tokio::test]
    async fn migration_out_of_sequence_is_rejected() {
        struct SkipTo2;
        #[async_trait]
        impl Migration for SkipTo2 {
            fn version(&self) -> u64 {
                2
            }
            fn description(&self) -> &str {
                "skip straight to v2"
            }
            async fn up(&self, _store: &dyn GraphStore) -> Result<()> {
                Ok(())
            }
        }
        let store = InMemoryGraphStore::new();
        let migrations: Vec<Box<dyn Migration>> = vec![Box::new(SkipTo2)];
        let result = store.migrate(&migrations).await;
        assert!(result.is_err());
        assert_eq!(store.schema_version().await.unwrap(), 0);
    }
}
