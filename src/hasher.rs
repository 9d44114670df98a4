// Content hashing and change detection for incremental indexing.

use crate::error::{EngineError, Result};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// SHA-256 digest of a file's bytes, displayed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("content hash must be 32 bytes"))?;
        Ok(ContentHash(arr))
    }
}

/// Hash raw bytes. Pure and synchronous; the building block every other
/// hashing operation in this module delegates to.
pub fn hash_content(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    ContentHash(out)
}

/// Hash a single file's contents from disk.
pub async fn hash_file(path: impl AsRef<Path>) -> Result<ContentHash> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        EngineError::Filesystem {
            message: format!("failed to read {}: {e}", path.display()),
            context: HashMap::from([("path".to_string(), path.display().to_string())]),
        }
    })?;
    Ok(hash_content(&bytes))
}

/// Result of hashing a batch of files concurrently.
#[derive(Debug, Clone)]
pub struct FileHashBatch {
    pub hashes: HashMap<PathBuf, ContentHash>,
    pub errors: HashMap<PathBuf, String>,
    pub elapsed: Duration,
}

/// Hash many files with bounded concurrency, collecting per-file failures
/// rather than aborting the whole batch.
pub async fn hash_files(paths: &[PathBuf], concurrency: usize) -> FileHashBatch {
    let start = Instant::now();
    let concurrency = concurrency.max(1);

    let results: Vec<(PathBuf, std::result::Result<ContentHash, String>)> = stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let result = hash_file(&path).await.map_err(|e| e.to_string());
            (path, result)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut hashes = HashMap::new();
    let mut errors = HashMap::new();
    for (path, result) in results {
        match result {
            Ok(hash) => {
                hashes.insert(path, hash);
            }
            Err(message) => {
                warn!(path = %path.display(), error = %message, "failed to hash file");
                errors.insert(path, message);
            }
        }
    }

    FileHashBatch {
        hashes,
        errors,
        elapsed: start.elapsed(),
    }
}

/// Classification of a set of candidate paths against previously stored
/// content hashes.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Pure classification, no I/O: compares freshly computed hashes for
/// `current` against the `stored` map, and reports anything present in
/// `stored` but absent from `current` as removed.
pub fn detect_changes(
    current: &HashMap<PathBuf, ContentHash>,
    stored: &HashMap<PathBuf, ContentHash>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, hash) in current {
        match stored.get(path) {
            None => changes.added.push(path.clone()),
            Some(prev) if prev == hash => changes.unchanged.push(path.clone()),
            Some(_) => changes.modified.push(path.clone()),
        }
    }

    for path in stored.keys() {
        if !current.contains_key(path) {
            changes.removed.push(path.clone());
        }
    }

    changes
}

/// Process-scoped cache of last-known content hashes, owned by the indexer
/// coordinator and passed by reference rather than looked up through global
/// state.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: DashMap<PathBuf, ContentHash>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<ContentHash> {
        self.entries.get(path).map(|e| *e)
    }

    pub fn insert(&self, path: PathBuf, hash: ContentHash) {
        self.entries.insert(path, hash);
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
        debug!(path = %path.display(), "invalidated hash cache entry");
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> HashMap<PathBuf, ContentHash> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_content_is_deterministic() {
        let a = hash_content(b"fn main() {}");
        let b = hash_content(b"fn main() {}");
        assert_eq!(a, b);
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn hash_content_differs_on_change() {
        let a = hash_content(b"fn main() {}");
        let b = hash_content(b"fn main() { }");
        assert_ne!(a, b);
    }

    #[test]
    fn detect_changes_classifies_all_buckets() {
        let unchanged = hash_content(b"same");
        let old = hash_content(b"old");
        let new = hash_content(b"new");

        let mut stored = HashMap::new();
        stored.insert(PathBuf::from("a.rs"), unchanged);
        stored.insert(PathBuf::from("b.rs"), old);
        stored.insert(PathBuf::from("d.rs"), old);

        let mut current = HashMap::new();
        current.insert(PathBuf::from("a.rs"), unchanged);
        current.insert(PathBuf::from("b.rs"), new);
        current.insert(PathBuf::from("c.rs"), new);

        let changes = detect_changes(&current, &stored);
        assert_eq!(changes.unchanged, vec![PathBuf::from("a.rs")]);
        assert_eq!(changes.modified, vec![PathBuf::from("b.rs")]);
        assert_eq!(changes.added, vec![PathBuf::from("c.rs")]);
        assert_eq!(changes.removed, vec![PathBuf::from("d.rs")]);
    }

    #[tokio::test]
    async fn hash_files_reports_missing_files_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.rs");
        tokio::fs::write(&present, b"content").await.unwrap();
        let missing = dir.path().join("missing.rs");

        let batch = hash_files(&[present.clone(), missing.clone()], 4).await;
        assert!(batch.hashes.contains_key(&present));
        assert!(batch.errors.contains_key(&missing));
    }

    #[test]
    fn hash_cache_invalidate_removes_entry() {
        let cache = HashCache::new();
        let path = PathBuf::from("x.rs");
        cache.insert(path.clone(), hash_content(b"x"));
        assert!(cache.get(&path).is_some());
        cache.invalidate(&path);
        assert!(cache.get(&path).is_none());
    }
}
