//! Indexer Coordinator (C6): phases scanning -> parsing -> extracting ->
//! writing -> complete. Ties together the hasher, parser/extractor,
//! store, batch writer, and ledger into the full and incremental indexing
//! pipelines, plus the single-file forms.

use crate::error::{EngineError, Result};
use crate::extractor::Extractor;
use crate::hasher::{detect_changes, hash_files, ChangeSet, HashCache};
use crate::model::{CodeEntity, Edge, File as IndexedFile, LedgerEntry};
use crate::optimization::batch_writer::{BatchWriter, BatchWriterConfig};
use crate::optimization::ledger::Ledger;
use crate::parsing::SupportedLanguage;
use crate::store::{GraphStore, QueryValue, Row};
use crate::types::ValidatedDocumentId;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Parsing,
    Extracting,
    Writing,
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseCounters {
    pub files: usize,
    pub elapsed: Duration,
    pub errors: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    pub scanning: PhaseCounters,
    pub parsing: PhaseCounters,
    pub extracting: PhaseCounters,
    pub writing: PhaseCounters,
    pub total_errors: usize,
}

/// Invoked once per per-file error when `continue_on_error` is set;
/// otherwise the error is propagated and the run aborts.
pub type ErrorCallback = Box<dyn Fn(&EngineError) + Send + Sync>;

#[derive(Clone)]
pub struct IndexerConfig {
    pub concurrency: usize,
    pub continue_on_error: bool,
    pub batch_writer: BatchWriterConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get().max(1),
            continue_on_error: true,
            batch_writer: BatchWriterConfig::default(),
        }
    }
}

fn detect_language(path: &Path) -> Option<SupportedLanguage> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "rs" => Some(SupportedLanguage::Rust),
        "py" => Some(SupportedLanguage::Python),
        #[cfg(feature = "tree-sitter-parsing")]
        "ts" | "tsx" => Some(SupportedLanguage::TypeScript),
        #[cfg(feature = "tree-sitter-parsing")]
        "js" | "jsx" | "mjs" => Some(SupportedLanguage::JavaScript),
        _ => None,
    }
}

struct FileExtraction {
    file: IndexedFile,
    entities: Vec<CodeEntity>,
    edges: Vec<Edge>,
}

/// Coordinates the full indexing pipeline over a `GraphStore`.
pub struct Indexer {
    store: Arc<dyn GraphStore>,
    ledger: Arc<dyn Ledger>,
    config: IndexerConfig,
    /// path -> file id, kept so `index_file`/`remove_file` can address an
    /// existing file's row without a round-trip query.
    known_files: Mutex<HashMap<PathBuf, ValidatedDocumentId>>,
    /// path -> last-indexed content hash, consulted by
    /// `index_project_incremental` to classify each rescanned path.
    hash_cache: HashCache,
    error_callback: Option<ErrorCallback>,
}

impl Indexer {
    pub fn new(store: Arc<dyn GraphStore>, ledger: Arc<dyn Ledger>, config: IndexerConfig) -> Self {
        Self {
            store,
            ledger,
            config,
            known_files: Mutex::new(HashMap::new()),
            hash_cache: HashCache::new(),
            error_callback: None,
        }
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.error_callback = Some(callback);
        self
    }

    fn handle_error(&self, counters: &mut PhaseCounters, err: EngineError) -> Result<()> {
        counters.errors += 1;
        if self.config.continue_on_error {
            if let Some(cb) = &self.error_callback {
                cb(&err);
            }
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Walks every file under `root` matching `include` and not matching
    /// `ignore`, producing the full `IndexResult` for a from-scratch run.
    pub async fn index_project(
        &self,
        root: &Path,
        include: &[String],
        ignore: &[String],
    ) -> Result<IndexResult> {
        let paths = self.scan(root, include, ignore)?;
        self.index_paths(paths, false).await
    }

    /// Consults `detect_changes` against stored hashes and processes only
    /// `{added ∪ modified}`; files missing from the rescan are removed
    /// transactionally.
    pub async fn index_project_incremental(
        &self,
        root: &Path,
        include: &[String],
        ignore: &[String],
    ) -> Result<IndexResult> {
        let paths = self.scan(root, include, ignore)?;
        let current = hash_files(&paths, self.config.concurrency.max(1)).await.hashes;
        let stored = self.hash_cache.snapshot();
        let ChangeSet {
            added,
            modified,
            removed,
            ..
        } = detect_changes(&current, &stored);

        for path in &removed {
            self.remove_file(path).await?;
        }

        let to_process: Vec<PathBuf> = added.into_iter().chain(modified).collect();
        self.index_paths(to_process, true).await
    }

    /// Indexes a single file: entities for that file are replaced
    /// wholesale in one store transaction (delete old -> insert new ->
    /// rewrite outgoing edges).
    pub async fn index_file(&self, path: &Path) -> Result<()> {
        let extraction = self.parse_and_extract(path).await?;
        self.write_file_transactionally(extraction).await
    }

    /// Deletes a file's entities, embeddings, and outgoing edges, cascading
    /// the removal through every relation that references them.
    pub async fn remove_file(&self, path: &Path) -> Result<()> {
        let file_id = {
            let mut known = self.known_files.lock().await;
            known.remove(path)
        };
        self.hash_cache.invalidate(path);
        let Some(file_id) = file_id else {
            return Ok(());
        };

        let removed_entities = self.cascade_delete_file_contents(file_id).await?;
        self.store.delete_by_id("files", file_id).await?;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            seq: 0,
            timestamp: Utc::now(),
            kind: "index:file:removed".to_string(),
            actor: "indexer".to_string(),
            description: format!("removed {}", path.display()),
            impacted_files: vec![path.display().to_string()],
            impacted_entities: removed_entities,
            metadata: HashMap::new(),
        };
        self.ledger.append(entry).await?;
        Ok(())
    }

    /// Deletes every entity row keyed by `file_id`, plus every edge and
    /// embedding that referenced the file or one of those entities, and
    /// returns the deleted entities' ids. `delete_by_id` keys on a row's own
    /// `id` field, which is never `file_id` for an entity row, so a
    /// field-scoped delete is required here rather than `delete_by_id`.
    async fn cascade_delete_file_contents(
        &self,
        file_id: ValidatedDocumentId,
    ) -> Result<Vec<ValidatedDocumentId>> {
        let removed_entities = self
            .store
            .delete_by_field("entities", "file_id", &QueryValue::Id(file_id))
            .await?;

        self.store
            .delete_by_field("edges", "from_id", &QueryValue::Id(file_id))
            .await?;
        for entity_id in &removed_entities {
            self.store
                .delete_by_field("edges", "from_id", &QueryValue::Id(*entity_id))
                .await?;
            self.store
                .delete_by_field("edges", "to_id", &QueryValue::Id(*entity_id))
                .await?;
            self.store.delete_embedding(*entity_id).await?;
        }
        Ok(removed_entities)
    }

    fn scan(&self, root: &Path, include: &[String], ignore: &[String]) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        self.walk(root, include, ignore, &mut matches)?;
        Ok(matches)
    }

    fn walk(
        &self,
        dir: &Path,
        include: &[String],
        ignore: &[String],
        out: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| EngineError::Filesystem {
            message: e.to_string(),
            context: HashMap::new(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::Filesystem {
                message: e.to_string(),
                context: HashMap::new(),
            })?;
            let path = entry.path();
            let path_str = path.to_string_lossy();
            if ignore.iter().any(|pattern| path_str.contains(pattern.as_str())) {
                continue;
            }
            if path.is_dir() {
                self.walk(&path, include, ignore, out)?;
                continue;
            }
            if include.is_empty() || include.iter().any(|pattern| path_str.ends_with(pattern.as_str())) {
                if detect_language(&path).is_some() {
                    out.push(path);
                }
            }
        }
        Ok(())
    }

    async fn parse_and_extract(&self, path: &Path) -> Result<FileExtraction> {
        let Some(language) = detect_language(path) else {
            return Err(EngineError::invalid_argument(format!(
                "unsupported source language for {}",
                path.display()
            )));
        };
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Filesystem {
                message: e.to_string(),
                context: HashMap::new(),
            })?;
        let hash = crate::hasher::hash_content(content.as_bytes());

        let file_id = {
            let known = self.known_files.lock().await;
            known.get(path).copied().unwrap_or_else(ValidatedDocumentId::new)
        };

        let indexed_file = IndexedFile {
            id: file_id,
            absolute_path: path.display().to_string(),
            relative_path: path.display().to_string(),
            content_hash: hash,
            size: content.len() as u64,
            indexed_at: Utc::now(),
        };

        let mut extractor = Extractor::new()?;
        let extraction = extractor.extract(file_id, &content, language)?;

        Ok(FileExtraction {
            file: indexed_file,
            entities: extraction.entities,
            edges: extraction.edges,
        })
    }

    async fn write_file_transactionally(&self, extraction: FileExtraction) -> Result<()> {
        let file_id = extraction.file.id;
        // Replace this file's entity set wholesale: delete the old rows
        // (and cascade to their edges/embeddings) before inserting the
        // freshly parsed ones, so a renamed or removed function never
        // lingers alongside its replacement.
        let old_entity_ids = self.cascade_delete_file_contents(file_id).await?;

        let file_row: Row = {
            let mut row = HashMap::new();
            row.insert("id".to_string(), QueryValue::Id(file_id));
            row.insert(
                "absolute_path".to_string(),
                QueryValue::Text(extraction.file.absolute_path.clone()),
            );
            row.insert(
                "content_hash".to_string(),
                QueryValue::Text(extraction.file.content_hash.to_string()),
            );
            row
        };
        self.store
            .write_batch("files", vec![file_row], crate::store::WriteOptions { upsert: true })
            .await?;

        let entity_rows: Vec<Row> = extraction
            .entities
            .iter()
            .map(|e| {
                let mut row = HashMap::new();
                row.insert("id".to_string(), QueryValue::Id(e.id));
                row.insert("file_id".to_string(), QueryValue::Id(e.file_id));
                row.insert("name".to_string(), QueryValue::Text(e.name.clone()));
                row.insert(
                    "kind".to_string(),
                    QueryValue::Text(e.kind.as_tag().to_string()),
                );
                if let Some(sig) = &e.signature {
                    row.insert("signature".to_string(), QueryValue::Text(sig.clone()));
                }
                if let Some(src) = &e.source_code {
                    row.insert("source_code".to_string(), QueryValue::Text(src.clone()));
                }
                if let Some(class_of) = &e.class_of {
                    row.insert("class_of".to_string(), QueryValue::Text(class_of.clone()));
                }
                if let Some(extends) = &e.extends {
                    row.insert("extends".to_string(), QueryValue::Text(extends.clone()));
                }
                row
            })
            .collect();
        // Entities before edges: edges reference entity ids, so the
        // referenced rows must already exist when the edge rows land.
        self.store
            .write_batch("entities", entity_rows, crate::store::WriteOptions { upsert: true })
            .await?;

        let edge_rows: Vec<Row> = extraction
            .edges
            .iter()
            .map(|edge| {
                let mut row = HashMap::new();
                row.insert("id".to_string(), QueryValue::Id(ValidatedDocumentId::new()));
                row.insert("from_id".to_string(), QueryValue::Id(edge.from_id));
                row.insert("to_id".to_string(), QueryValue::Id(edge.to_id));
                row
            })
            .collect();
        self.store
            .write_batch("edges", edge_rows, crate::store::WriteOptions { upsert: true })
            .await?;

        let file_path = PathBuf::from(&extraction.file.absolute_path);
        self.known_files
            .lock()
            .await
            .insert(file_path.clone(), file_id);
        self.hash_cache.insert(file_path, extraction.file.content_hash);

        // Both the entity set being replaced and the one replacing it are
        // impacted: a consumer diffing the ledger needs the old ids to know
        // what disappeared, not just what landed.
        let mut impacted_entities = old_entity_ids;
        impacted_entities.extend(extraction.entities.iter().map(|e| e.id));

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            seq: 0,
            timestamp: Utc::now(),
            kind: "index:file:modified".to_string(),
            actor: "indexer".to_string(),
            description: format!("indexed {}", extraction.file.absolute_path),
            impacted_files: vec![extraction.file.absolute_path.clone()],
            impacted_entities,
            metadata: HashMap::new(),
        };
        self.ledger.append(entry).await?;

        Ok(())
    }

    async fn index_paths(&self, paths: Vec<PathBuf>, incremental: bool) -> Result<IndexResult> {
        let mut result = IndexResult::default();
        let scanning_started = Instant::now();
        result.scanning.files = paths.len();
        result.scanning.elapsed = scanning_started.elapsed();

        if paths.is_empty() {
            return Ok(result);
        }

        let batch_writer = Arc::new(BatchWriter::new(
            Arc::clone(&self.store),
            self.config.batch_writer,
        ));
        let _ = incremental; // reserved for future differential writer sizing

        let parsing_started = Instant::now();
        let mut join_set: JoinSet<std::result::Result<FileExtraction, (PathBuf, EngineError)>> =
            JoinSet::new();
        let mut pending: Vec<PathBuf> = paths.into_iter().rev().collect();
        let concurrency = self.config.concurrency.max(1);

        let mut extractions = Vec::new();
        while !pending.is_empty() || !join_set.is_empty() {
            while join_set.len() < concurrency {
                let Some(path) = pending.pop() else { break };
                let store = Arc::clone(&self.store);
                let known_files_snapshot = self.known_files.lock().await.clone();
                join_set.spawn(async move {
                    let file_id = known_files_snapshot
                        .get(&path)
                        .copied()
                        .unwrap_or_else(ValidatedDocumentId::new);
                    let _ = &store;
                    parse_and_extract_standalone(&path, file_id)
                        .map_err(|e| (path, e))
                });
            }
            if let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(extraction)) => extractions.push(extraction),
                    Ok(Err((path, err))) => {
                        self.handle_error(&mut result.extracting, err.clone())?;
                        tracing::warn!(path = %path.display(), error = %err, "indexing file failed");
                    }
                    Err(join_err) => {
                        self.handle_error(
                            &mut result.extracting,
                            EngineError::indexer(join_err.to_string()),
                        )?;
                    }
                }
            }
        }
        result.parsing.files = extractions.len();
        result.parsing.elapsed = parsing_started.elapsed();
        result.extracting.files = extractions.len();

        let writing_started = Instant::now();
        for extraction in extractions {
            let file_id = extraction.file.id;
            let absolute_path = extraction.file.absolute_path.clone();
            match self.write_file_transactionally(extraction).await {
                Ok(()) => result.writing.files += 1,
                Err(e) => {
                    self.known_files.lock().await.remove(Path::new(&absolute_path));
                    let _ = file_id;
                    self.handle_error(&mut result.writing, e)?;
                }
            }
        }
        batch_writer.shutdown().await?;
        result.writing.elapsed = writing_started.elapsed();
        result.total_errors = result.scanning.errors
            + result.parsing.errors
            + result.extracting.errors
            + result.writing.errors;
        Ok(result)
    }
}

/// Free-function variant of parse+extract used inside spawned tasks, since
/// `Extractor` is not `Send`-shared across a `JoinSet` closure borrowing
/// `self`.
fn parse_and_extract_standalone(
    path: &Path,
    file_id: ValidatedDocumentId,
) -> std::result::Result<FileExtraction, EngineError> {
    let Some(language) = detect_language(path) else {
        return Err(EngineError::invalid_argument(format!(
            "unsupported source language for {}",
            path.display()
        )));
    };
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::Filesystem {
        message: e.to_string(),
        context: HashMap::new(),
    })?;
    let hash = crate::hasher::hash_content(content.as_bytes());
    let indexed_file = IndexedFile {
        id: file_id,
        absolute_path: path.display().to_string(),
        relative_path: path.display().to_string(),
        content_hash: hash,
        size: content.len() as u64,
        indexed_at: Utc::now(),
    };
    let mut extractor = Extractor::new()?;
    let extraction = extractor.extract(file_id, &content, language)?;
    Ok(FileExtraction {
        file: indexed_file,
        entities: extraction.entities,
        edges: extraction.edges,
    })
}
