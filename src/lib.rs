// Code intelligence engine - root library module

pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod hasher;
pub mod hybrid_search;
pub mod indexer;
pub mod model;
pub mod model_router;
pub mod observability;
pub mod optimization;
pub mod path_utils;
pub mod query_builder;
pub mod query_sanitization;
pub mod similarity;
pub mod store;
pub mod telemetry;
pub mod trigram_index;
pub mod types;
pub mod validation;
pub mod watcher;

// Tree-sitter-backed multi-language parsing; falls back to a stub surface
// when the `tree-sitter-parsing` feature is disabled.
pub mod parsing;

// Re-export observability helpers.
pub use observability::{
    init_logging, init_logging_with_level, log_operation, record_metric, MetricType, Operation,
};

// Re-export validated newtypes.
pub use types::{
    NonZeroSize, RelationType, TimestampPair, ValidatedDocumentId, ValidatedLimit,
    ValidatedPageId, ValidatedPath, ValidatedSearchQuery, ValidatedTag, ValidatedTimestamp,
    ValidatedTitle,
};

// Re-export the error taxonomy.
pub use error::{EngineError, ErrorRecord, Result};

// Re-export the domain model shared across every module.
pub use model::{
    CodeEntity, Edge, EdgeKind, Embedding, EntityKind, File, HeatEntry, Justification,
    LedgerEntry, LedgerEventKind, SpanData, SpanEvent, SpanStatus, SpanTiming,
};

// Re-export the content hasher and change detector (C1).
pub use hasher::{
    detect_changes, hash_content, hash_file, hash_files, ChangeSet, ContentHash, FileHashBatch,
    HashCache,
};

// Re-export the extraction pipeline (C3).
pub use extractor::{
    ErrorPath, ErrorPathAnalyzer, ExtractionResult, Extractor, HandlingStrategy, Parameter,
    ParameterAnalyzer, ParameterPurpose, ParameterUsage, SideEffect, SideEffectCategory,
    SideEffectDetector, SideEffectOptions,
};

// Re-export the graph/vector store (C4).
pub use store::{
    create_in_memory_store, GraphStore, InMemoryGraphStore, Migration, QueryParams, QueryResult,
    QueryScript, QueryStats, QueryValue, Row, VectorHit, WriteOptions,
};

// Re-export the query builder (C5).
pub use query_builder::{
    to_caller_case, to_store_case, Condition, Join, JoinKind, Op, OrderBy, OrderDirection,
    QueryBuilder, Rule, VectorSearchClause,
};

// Re-export the incremental indexer coordinator (C6).
pub use indexer::{ErrorCallback, IndexResult, Indexer, IndexerConfig, Phase, PhaseCounters};

// Re-export the file watcher (C7).
pub use watcher::{FileChangeBatch, FileWatcher, RawChangeKind, WatcherConfig, WatcherState};

// Re-export embedding generation and similarity/clustering (C8).
pub use embeddings::{
    EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType, EmbeddingResult, EmbeddingService,
    ProviderConfig,
};
pub use embeddings::models;
pub use similarity::{
    cluster_similar_code, Cluster, ClusterOptions, SimilarEntity, SimilarityOptions,
    SimilarityService,
};

// Re-export the hybrid search service (C9).
pub use hybrid_search::{
    classify_intent, FusionWeights, HybridSearchService, Intent, LexicalEngine, LexicalHit,
    SearchMeta, SearchOptions, SearchResponse, SearchResult, Source, TrigramLexicalEngine,
};

// Re-export the optimization layer (C10).
pub use optimization::{create_optimizer, OptimizationConfig, Optimizer};
pub use optimization::ledger::{
    ledger_not_found, InMemoryLedger, Ledger, WriteBehindLedger,
};

// Re-export the model router and feedback loop (C11).
pub use model_router::{
    AdjustmentKind, Capability, CompletionRequest, CompletionResponse, FeedbackLoop,
    FeedbackLoopConfig, ModelConfig, ModelOutcome, ModelProvider, ModelRouter, ModelStatsSnapshot,
    RoutingDecision, RoutingPolicy, RouterStats, StreamChunk, Task,
};

// Re-export telemetry (C12).
pub use telemetry::{
    ConsoleExporter, FileExporter, MemoryExporter, Span, SpanOptions, TelemetryConfig,
    TelemetryManager, TraceExporter,
};

// Re-export query sanitization helpers.
pub use query_sanitization::{
    filter_stop_words, is_stop_word, sanitize_path_pattern, sanitize_search_query, sanitize_tag,
    SanitizedQuery,
};

// Re-export path normalization helpers.
pub use path_utils::{
    normalize_file_entry, normalize_path_relative, paths_equivalent, PathError,
    PathNormalizationConfig, PathNormalizer,
};

#[cfg(feature = "tree-sitter-parsing")]
pub use parsing::{
    CodeParser, ParseStats, ParsedCode, ParsedSymbol, ParsingConfig, SupportedLanguage, SymbolKind,
    SymbolType,
};
