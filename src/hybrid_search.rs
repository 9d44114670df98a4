//! Hybrid search service (C9): fuses semantic (vector) and lexical
//! (trigram) retrieval via reciprocal-rank fusion, applies heuristic
//! boosts, resolves snippets, and normalizes scores.

use crate::embeddings::EmbeddingService;
use crate::error::{EngineError, Result};
use crate::model::{CodeEntity, EntityKind};
use crate::store::GraphStore;
use crate::trigram_index::TrigramIndex;
use crate::types::ValidatedDocumentId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Closed intent set. Selects the fusion weights used by reciprocal-rank
/// fusion: definition favours semantic, usage favours lexical, conceptual
/// leans semantic, keyword is balanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Definition,
    Usage,
    Conceptual,
    Keyword,
}

static DEFINITION_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwhere\s+is\b.*\bdefined\b|^class\s+\w|^interface\s+\w").unwrap()
});
static USAGE_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwho\s+calls\b|\busages?\s+of\b|\bwhere\s+is\b.*\b(used|called)\b").unwrap()
});
static CONCEPTUAL_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\?\s*$|\bhow\s+does\b.*\bwork\b|\bexplain\b|\bwhat\s+is\s+the\s+purpose\b|^where\s+is\b")
        .unwrap()
});

/// Evaluates the ordered intent-classification rules from a query string.
pub fn classify_intent(query: &str) -> Intent {
    if DEFINITION_CUES.is_match(query) {
        Intent::Definition
    } else if USAGE_CUES.is_match(query) {
        Intent::Usage
    } else if CONCEPTUAL_CUES.is_match(query) {
        Intent::Conceptual
    } else {
        Intent::Keyword
    }
}

/// Per-intent reciprocal-rank-fusion constants. Lower `k` weights an
/// engine's top ranks more heavily.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub k_semantic: f32,
    pub k_lexical: f32,
}

impl Intent {
    pub fn fusion_weights(self) -> FusionWeights {
        match self {
            Intent::Definition => FusionWeights {
                k_semantic: 30.0,
                k_lexical: 80.0,
            },
            Intent::Usage => FusionWeights {
                k_semantic: 80.0,
                k_lexical: 30.0,
            },
            Intent::Conceptual => FusionWeights {
                k_semantic: 40.0,
                k_lexical: 70.0,
            },
            Intent::Keyword => FusionWeights {
                k_semantic: 60.0,
                k_lexical: 60.0,
            },
        }
    }
}

/// One entity indexed for lexical retrieval.
#[derive(Debug, Clone)]
struct LexicalDoc {
    file_path: String,
    kind: EntityKind,
    name: String,
    signature: Option<String>,
    source_code: Option<String>,
    trigram_freq: HashMap<String, usize>,
    word_count: usize,
}

/// A lexical search hit: the entity, its file path, and the matched line
/// (if the source text contained a literal substring match) for snippet
/// resolution.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub entity_id: ValidatedDocumentId,
    pub file_path: String,
    pub score: f64,
    pub matched_line: Option<String>,
}

/// Abstraction over the lexical/regex retrieval engine so the service can
/// fall back to semantic-only search when it is unavailable.
#[async_trait::async_trait]
pub trait LexicalEngine: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>>;
}

/// Trigram-based [`LexicalEngine`] built on
/// [`crate::trigram_index::TrigramIndex`]'s trigram extraction and
/// relevance-scoring functions, indexing each [`CodeEntity`]'s name and
/// signature text directly rather than a whole-file document.
pub struct TrigramLexicalEngine {
    docs: RwLock<HashMap<ValidatedDocumentId, LexicalDoc>>,
}

impl Default for TrigramLexicalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrigramLexicalEngine {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    fn searchable_text(entity: &CodeEntity) -> String {
        let mut text = entity.name.clone();
        if let Some(sig) = &entity.signature {
            text.push(' ');
            text.push_str(sig);
        }
        if let Some(src) = &entity.source_code {
            text.push(' ');
            text.push_str(src);
        }
        text
    }

    pub async fn index_entity(&self, entity: &CodeEntity, file_path: &str) {
        let text = Self::searchable_text(entity);
        let word_count = text.split_whitespace().count();
        let trigrams = TrigramIndex::extract_trigrams(&text);
        let mut trigram_freq = HashMap::new();
        for t in trigrams {
            *trigram_freq.entry(t).or_insert(0usize) += 1;
        }
        self.docs.write().await.insert(
            entity.id,
            LexicalDoc {
                file_path: file_path.to_string(),
                kind: entity.kind,
                name: entity.name.clone(),
                signature: entity.signature.clone(),
                source_code: entity.source_code.clone(),
                trigram_freq,
                word_count,
            },
        );
    }

    pub async fn remove_entity(&self, entity_id: ValidatedDocumentId) {
        self.docs.write().await.remove(&entity_id);
    }

    /// Best literal-match line within an entity's source, if any, for
    /// snippet resolution priority step one.
    fn matched_line(doc: &LexicalDoc, query: &str) -> Option<String> {
        let needle = query.to_lowercase();
        doc.source_code.as_ref().and_then(|src| {
            src.lines()
                .find(|line| line.to_lowercase().contains(&needle))
                .map(|line| line.trim().to_string())
        })
    }
}

#[async_trait::async_trait]
impl LexicalEngine for TrigramLexicalEngine {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let query_trigrams = TrigramIndex::extract_trigrams(query);
        let docs = self.docs.read().await;
        let mut hits: Vec<LexicalHit> = docs
            .iter()
            .filter_map(|(id, doc)| {
                let score = TrigramIndex::calculate_relevance_score_optimized(
                    &query_trigrams,
                    &doc.trigram_freq,
                    doc.word_count,
                );
                if score <= 0.0 {
                    return None;
                }
                Some(LexicalHit {
                    entity_id: *id,
                    file_path: doc.file_path.clone(),
                    score,
                    matched_line: Self::matched_line(doc, query),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Semantic,
    Lexical,
    Both,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub file_path: String,
    pub entity_id: Option<ValidatedDocumentId>,
    pub score: f32,
    pub source: Source,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub enable_query_expansion: bool,
    pub limit: usize,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            enable_query_expansion: false,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchMeta {
    pub intent: Intent,
    pub semantic_count: usize,
    pub lexical_count: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub meta: SearchMeta,
}

const SNIPPET_MAX_LEN: usize = 240;

fn truncate_snippet(s: &str) -> String {
    if s.len() <= SNIPPET_MAX_LEN {
        s.to_string()
    } else {
        format!("{}…", &s[..SNIPPET_MAX_LEN])
    }
}

/// Fused, per-file accumulator used while building the final ranked list.
struct Fused {
    file_path: String,
    score: f32,
    semantic_rank: Option<usize>,
    lexical_rank: Option<usize>,
    entity_id: Option<ValidatedDocumentId>,
    lexical_snippet: Option<String>,
    top_kind: Option<EntityKind>,
    top_signature: Option<String>,
    class_decl: Option<String>,
}

#[derive(Debug, Clone)]
struct EntityInfo {
    file_path: String,
    kind: Option<EntityKind>,
    name: String,
    signature: Option<String>,
    extends: Option<String>,
}

pub struct HybridSearchService {
    store: Arc<dyn GraphStore>,
    embeddings: Arc<EmbeddingService>,
    lexical: Option<Arc<dyn LexicalEngine>>,
    /// incoming-call count per entity, used by the popular-entity boost.
    incoming_calls: Arc<dyn Fn(ValidatedDocumentId) -> u64 + Send + Sync>,
}

impl HybridSearchService {
    pub fn new(store: Arc<dyn GraphStore>, embeddings: Arc<EmbeddingService>) -> Self {
        Self {
            store,
            embeddings,
            lexical: None,
            incoming_calls: Arc::new(|_| 0),
        }
    }

    pub fn with_lexical_engine(mut self, engine: Arc<dyn LexicalEngine>) -> Self {
        self.lexical = Some(engine);
        self
    }

    pub fn with_incoming_calls(
        mut self,
        f: impl Fn(ValidatedDocumentId) -> u64 + Send + Sync + 'static,
    ) -> Self {
        self.incoming_calls = Arc::new(f);
        self
    }

    async fn semantic_search(&self, query: &str, limit: usize) -> Vec<(ValidatedDocumentId, usize)> {
        let Ok(vector) = self.embeddings.embed(query).await else {
            return Vec::new();
        };
        let Ok(hits) = self.store.vector_search(&vector, limit).await else {
            return Vec::new();
        };
        hits.into_iter()
            .enumerate()
            .map(|(rank, hit)| (hit.id, rank + 1))
            .collect()
    }

    /// Joins the `entities` and `files` relations client-side (the
    /// in-memory store has no server-side join) into per-entity info
    /// used both to resolve a file path and to build the snippet
    /// fallback chain.
    async fn entity_info(&self) -> HashMap<ValidatedDocumentId, EntityInfo> {
        use crate::store::{QueryParams, QueryScript, QueryValue};

        let empty = QueryParams::new();
        let Ok(files) = self
            .store
            .query(&QueryScript::new("files", "*"), &empty)
            .await
        else {
            return HashMap::new();
        };
        let mut path_by_file: HashMap<ValidatedDocumentId, String> = HashMap::new();
        for row in files.rows {
            if let (Some(QueryValue::Id(id)), Some(QueryValue::Text(path))) =
                (row.get("id"), row.get("absolute_path"))
            {
                path_by_file.insert(*id, path.clone());
            }
        }

        let Ok(entities) = self
            .store
            .query(&QueryScript::new("entities", "*"), &empty)
            .await
        else {
            return HashMap::new();
        };
        let mut info = HashMap::new();
        for row in entities.rows {
            let (Some(QueryValue::Id(entity_id)), Some(QueryValue::Id(file_id))) =
                (row.get("id"), row.get("file_id"))
            else {
                continue;
            };
            let Some(path) = path_by_file.get(file_id) else {
                continue;
            };
            let kind = match row.get("kind") {
                Some(QueryValue::Text(t)) => EntityKind::from_tag(t),
                _ => None,
            };
            let name = match row.get("name") {
                Some(QueryValue::Text(t)) => t.clone(),
                _ => String::new(),
            };
            let signature = match row.get("signature") {
                Some(QueryValue::Text(t)) => Some(t.clone()),
                _ => None,
            };
            let extends = match row.get("extends") {
                Some(QueryValue::Text(t)) => Some(t.clone()),
                _ => None,
            };
            info.insert(
                *entity_id,
                EntityInfo {
                    file_path: path.clone(),
                    kind,
                    name,
                    signature,
                    extends,
                },
            );
        }
        info
    }

    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let start = Instant::now();
        let intent = classify_intent(query);
        let weights = intent.fusion_weights();
        let limit = options.limit.max(1);

        let (semantic_hits, lexical_hits) = tokio::join!(
            self.semantic_search(query, limit * 2),
            async {
                if let Some(engine) = &self.lexical {
                    engine.search(query, limit * 2).await.unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
        );

        let entity_info = self.entity_info().await;
        let mut fused: HashMap<String, Fused> = HashMap::new();

        for (entity_id, rank) in &semantic_hits {
            let Some(info) = entity_info.get(entity_id) else {
                continue;
            };
            let path = info.file_path.clone();
            let contribution = 1.0 / (weights.k_semantic + *rank as f32);
            let entry = fused.entry(path.clone()).or_insert_with(|| Fused {
                file_path: path.clone(),
                score: 0.0,
                semantic_rank: None,
                lexical_rank: None,
                entity_id: Some(*entity_id),
                lexical_snippet: None,
                top_kind: None,
                top_signature: None,
                class_decl: None,
            });
            entry.score += contribution;
            let better_rank = entry.semantic_rank.map_or(true, |r| *rank < r);
            entry.semantic_rank = Some(entry.semantic_rank.map_or(*rank, |r| r.min(*rank)));
            if entry.entity_id.is_none() || better_rank {
                entry.entity_id = Some(*entity_id);
                entry.top_kind = info.kind;
                entry.top_signature = info.signature.clone();
                entry.class_decl = match info.kind {
                    Some(EntityKind::Class) => Some(match &info.extends {
                        Some(parent) => format!("class {} extends {}", info.name, parent),
                        None => format!("class {}", info.name),
                    }),
                    Some(EntityKind::Interface) => Some(format!("interface {}", info.name)),
                    _ => None,
                };
            }
        }

        for (rank, hit) in lexical_hits.iter().enumerate() {
            let rank = rank + 1;
            let contribution = 1.0 / (weights.k_lexical + rank as f32);
            let entry = fused.entry(hit.file_path.clone()).or_insert_with(|| Fused {
                file_path: hit.file_path.clone(),
                score: 0.0,
                semantic_rank: None,
                lexical_rank: None,
                entity_id: Some(hit.entity_id),
                lexical_snippet: None,
                top_kind: None,
                top_signature: None,
                class_decl: None,
            });
            entry.score += contribution;
            entry.lexical_rank = Some(entry.lexical_rank.map_or(rank, |r| r.min(rank)));
            if entry.lexical_snippet.is_none() {
                entry.lexical_snippet = hit.matched_line.clone();
            }
        }

        let file_stem_query = query.rsplit('/').next().unwrap_or(query).to_lowercase();
        for entry in fused.values_mut() {
            let path_stem = entry
                .file_path
                .rsplit('/')
                .next()
                .unwrap_or(&entry.file_path)
                .to_lowercase();
            if !file_stem_query.is_empty() && path_stem == file_stem_query {
                entry.score *= 1.5;
            }
            if intent == Intent::Definition && entry.semantic_rank.is_some() {
                entry.score *= 1.1;
            }
            if let Some(id) = entry.entity_id {
                let calls = (self.incoming_calls)(id);
                // monotone, capped popularity boost.
                let boost = 1.0 + (calls as f32).min(50.0) / 100.0;
                entry.score *= boost;
            }
        }

        let max_score = fused
            .values()
            .map(|f| f.score)
            .fold(0.0_f32, f32::max);

        let mut results: Vec<SearchResult> = fused
            .into_values()
            .map(|f| {
                let source = match (f.semantic_rank, f.lexical_rank) {
                    (Some(_), Some(_)) => Source::Both,
                    (Some(_), None) => Source::Semantic,
                    (None, Some(_)) => Source::Lexical,
                    (None, None) => Source::Lexical,
                };
                let signature_if_function = (f.top_kind == Some(EntityKind::Function))
                    .then(|| f.top_signature.clone())
                    .flatten();
                let snippet = f
                    .lexical_snippet
                    .clone()
                    .or(signature_if_function)
                    .or_else(|| f.class_decl.clone())
                    .map(|s| truncate_snippet(&s));
                let normalized = if max_score > 0.0 { f.score / max_score } else { 0.0 };
                SearchResult {
                    file_path: f.file_path,
                    entity_id: f.entity_id,
                    score: normalized,
                    source,
                    snippet,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        results.truncate(limit);

        Ok(SearchResponse {
            results,
            meta: SearchMeta {
                intent,
                semantic_count: semantic_hits.len(),
                lexical_count: lexical_hits.len(),
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
        })
    }
}

impl EngineError {
    /// Convenience used by callers building a [`HybridSearchService`]
    /// without a configured lexical engine.
    pub fn lexical_unavailable() -> Self {
        EngineError::storage("lexical engine unavailable")
    }
}
