//! Core domain entities shared across the indexer, store, and search pipeline.
//!
//! These are the tagged-variant, closed-enum shapes the rest of the crate
//! builds on, following the same validated-newtype discipline as
//! [`crate::types`].

use crate::hasher::ContentHash;
use crate::types::ValidatedDocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// A source file tracked by the indexer. Identity is the absolute path;
/// `content_hash` drives change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: ValidatedDocumentId,
    pub absolute_path: String,
    pub relative_path: String,
    pub content_hash: ContentHash,
    pub size: u64,
    pub indexed_at: DateTime<Utc>,
}

/// Closed set of code entity kinds. Never an open string — callers match
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
    Variable,
}

impl EntityKind {
    /// Stable lowercase tag for persistence (store rows, cache keys).
    pub fn as_tag(self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::TypeAlias => "type_alias",
            EntityKind::Variable => "variable",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "function" => Some(EntityKind::Function),
            "method" => Some(EntityKind::Method),
            "class" => Some(EntityKind::Class),
            "interface" => Some(EntityKind::Interface),
            "type_alias" => Some(EntityKind::TypeAlias),
            "variable" => Some(EntityKind::Variable),
            _ => None,
        }
    }
}

/// A structural fact extracted from a file: a function, method, class, etc.
///
/// IDs are stable across re-indexes for unchanged entities: derived from
/// `(file_id, kind, name, start_line)` plus a disambiguating counter when
/// more than one entity shares that tuple (e.g. overloaded methods).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntity {
    pub id: ValidatedDocumentId,
    pub kind: EntityKind,
    pub name: String,
    pub file_id: ValidatedDocumentId,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: Option<String>,
    pub source_code: Option<String>,
    /// Present for `Method`: the owning class/interface name.
    pub class_of: Option<String>,
    /// Present for `Class`/`Interface`: the supertype name, if any.
    pub extends: Option<String>,
}

impl CodeEntity {
    /// Derive a stable ID from the identity tuple; `disambiguator` breaks
    /// ties when the same `(file, kind, name, start_line)` recurs (e.g.
    /// overload sets) within a single extraction pass.
    pub fn derive_id(
        file_id: ValidatedDocumentId,
        kind: EntityKind,
        name: &str,
        start_line: u32,
        disambiguator: u32,
    ) -> ValidatedDocumentId {
        let seed = format!("{file_id}:{kind:?}:{name}:{start_line}:{disambiguator}");
        Self::derive_stable_id(&seed)
    }

    /// Derives a stable id for something an edge needs to point at that is
    /// not itself an indexed `CodeEntity` — an import target, for instance,
    /// before the file it names has ever been indexed. `namespace` keeps
    /// these ids from colliding with `derive_id`'s entity-identity tuples or
    /// with external ids from a different namespace. Deterministic, so
    /// repeated extraction of the same reference always yields the same id.
    pub fn derive_external_id(namespace: &str, seed: &str) -> ValidatedDocumentId {
        Self::derive_stable_id(&format!("{namespace}:{seed}"))
    }

    fn derive_stable_id(seed: &str) -> ValidatedDocumentId {
        let digest = crate::hasher::hash_content(seed.as_bytes());
        // Use the first 16 bytes of the digest as a stable UUID so the same
        // seed always yields the same ID across re-indexes.
        let mut bytes: [u8; 16] = digest.as_bytes()[..16].try_into().expect("16 bytes");
        // A derived UUID of all zero bytes is vanishingly unlikely but would
        // be rejected as nil by `from_uuid`; force a low bit instead of
        // panicking on that edge case.
        if bytes.iter().all(|b| *b == 0) {
            bytes[15] = 1;
        }
        ValidatedDocumentId::from_uuid(Uuid::from_bytes(bytes))
            .expect("derived id bytes are never the nil uuid")
    }
}

/// Closed set of directed edge kinds between code entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Extends,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: ValidatedDocumentId,
    pub to_id: ValidatedDocumentId,
    pub kind: EdgeKind,
    pub meta: Option<HashMap<String, String>>,
}

/// A dense vector attached to exactly one (entity, model) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub entity_id: ValidatedDocumentId,
    pub model_id: String,
    pub dim: usize,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn validate_dimension(&self) -> Result<(), crate::error::EngineError> {
        if self.vector.len() != self.dim {
            return Err(crate::error::EngineError::invalid_argument(format!(
                "embedding declares dim {} but vector has length {}",
                self.dim,
                self.vector.len()
            )));
        }
        Ok(())
    }
}

/// Optional human-readable enrichment attached to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Justification {
    pub entity_id: ValidatedDocumentId,
    pub purpose: String,
    pub business_value: Option<String>,
    pub feature_context: Option<String>,
    pub confidence: f32,
    pub tags: Vec<String>,
}

/// Closed set of ledger event kinds, named `subsystem:action[:qualifier]`
/// by convention (e.g. `index:file:modified`).
pub type LedgerEventKind = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: LedgerEventKind,
    pub actor: String,
    pub description: String,
    pub impacted_files: Vec<String>,
    pub impacted_entities: Vec<ValidatedDocumentId>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatEntry {
    pub entity_id: ValidatedDocumentId,
    pub kind: EntityKind,
    pub score: f64,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

/// Closed set of span completion statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Serializable snapshot of a completed span, independent of the in-process
/// `Span` handle (which carries a non-serializable `Instant`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanData {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
}

/// Wall-clock start marker kept separately from `SpanData` since `Instant`
/// cannot be serialized; used internally to compute `end` precisely.
#[derive(Debug, Clone, Copy)]
pub struct SpanTiming {
    pub started_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_id_is_deterministic() {
        let file_id = ValidatedDocumentId::new();
        let a = CodeEntity::derive_id(file_id, EntityKind::Function, "parse", 10, 0);
        let b = CodeEntity::derive_id(file_id, EntityKind::Function, "parse", 10, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_id_disambiguates_overloads() {
        let file_id = ValidatedDocumentId::new();
        let a = CodeEntity::derive_id(file_id, EntityKind::Method, "new", 10, 0);
        let b = CodeEntity::derive_id(file_id, EntityKind::Method, "new", 10, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn embedding_rejects_dimension_mismatch() {
        let embedding = Embedding {
            entity_id: ValidatedDocumentId::new(),
            model_id: "test-model".to_string(),
            dim: 3,
            vector: vec![0.1, 0.2],
        };
        assert!(embedding.validate_dimension().is_err());
    }

    #[test]
    fn span_data_round_trips_through_json() {
        let span = SpanData {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            name: "index_file".to_string(),
            start: Utc::now(),
            end: Some(Utc::now()),
            attributes: HashMap::new(),
            events: Vec::new(),
            status: SpanStatus::Ok,
        };
        let json = serde_json::to_string(&span).unwrap();
        let back: SpanData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.span_id, span.span_id);
        assert_eq!(back.status, SpanStatus::Ok);
    }
}
