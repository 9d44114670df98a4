// Error taxonomy for the code intelligence engine.
// Every fallible public operation in the engine ultimately reports one of
// these variants, either directly or wrapped inside `anyhow::Error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable, machine-readable error taxonomy.
///
/// Variants are intentionally flat rather than nested per-component: callers
/// that persist or report errors (telemetry exporters, the ledger, HTTP-free
/// CLIs) match on `code()` rather than on the `Debug` representation, which
/// would churn as internals change.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("initialization failed: {message}")]
    Init {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("parse error at {file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("vector index error: {message}")]
    VectorIndex {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("model error: {message}")]
    Model {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("indexer error: {message}")]
    Indexer {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("filesystem error: {message}")]
    Filesystem {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
        context: HashMap<String, String>,
    },

    #[error("operation cancelled: {message}")]
    Cancelled { message: String },

    #[error("operation timed out after {elapsed_ms}ms: {message}")]
    Timeout { message: String, elapsed_ms: u64 },

    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        context: HashMap<String, String>,
    },
}

impl EngineError {
    /// Stable code suitable for metrics labels and log filtering.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Init { .. } => "init",
            EngineError::Parse { .. } => "parse",
            EngineError::Storage { .. } => "storage",
            EngineError::VectorIndex { .. } => "vector_index",
            EngineError::Protocol { .. } => "protocol",
            EngineError::Model { .. } => "model",
            EngineError::Indexer { .. } => "indexer",
            EngineError::Filesystem { .. } => "filesystem",
            EngineError::InvalidArgument { .. } => "invalid_argument",
            EngineError::Cancelled { .. } => "cancelled",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Unknown { .. } => "unknown",
        }
    }

    pub fn context(&self) -> HashMap<String, String> {
        match self {
            EngineError::Init { context, .. }
            | EngineError::Storage { context, .. }
            | EngineError::VectorIndex { context, .. }
            | EngineError::Protocol { context, .. }
            | EngineError::Model { context, .. }
            | EngineError::Indexer { context, .. }
            | EngineError::Filesystem { context, .. }
            | EngineError::InvalidArgument { context, .. }
            | EngineError::Unknown { context, .. } => context.clone(),
            EngineError::Parse { file, line, column, .. } => HashMap::from([
                ("file".to_string(), file.clone()),
                ("line".to_string(), line.to_string()),
                ("column".to_string(), column.to_string()),
            ]),
            EngineError::Cancelled { .. } | EngineError::Timeout { .. } => HashMap::new(),
        }
    }

    pub fn parse(file: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        EngineError::Parse {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        EngineError::Storage {
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn indexer(message: impl Into<String>) -> Self {
        EngineError::Indexer {
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        EngineError::Model {
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let ctx = match &mut self {
            EngineError::Init { context, .. }
            | EngineError::Storage { context, .. }
            | EngineError::VectorIndex { context, .. }
            | EngineError::Protocol { context, .. }
            | EngineError::Model { context, .. }
            | EngineError::Indexer { context, .. }
            | EngineError::Filesystem { context, .. }
            | EngineError::InvalidArgument { context, .. }
            | EngineError::Unknown { context, .. } => Some(context),
            _ => None,
        };
        if let Some(ctx) = ctx {
            ctx.insert(key.into(), value.into());
        }
        self
    }

    /// A serializable snapshot suitable for logging or telemetry export.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.code().to_string(),
            message: self.to_string(),
            timestamp: Utc::now(),
            context: self.context(),
        }
    }
}

/// Serializable error snapshot, independent of the `thiserror` enum shape,
/// for exporters and the ledger where a stable wire format matters more than
/// Rust-side pattern matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub context: HashMap<String, String>,
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_context_carries_location() {
        let err = EngineError::parse("src/lib.rs", 10, 4, "unexpected token");
        assert_eq!(err.code(), "parse");
        assert_eq!(err.context().get("line").map(String::as_str), Some("10"));
    }

    #[test]
    fn with_context_merges_into_contextful_variants() {
        let err = EngineError::storage("write failed").with_context("relation", "files");
        assert_eq!(err.context().get("relation").map(String::as_str), Some("files"));
    }

    #[test]
    fn cancelled_has_no_context() {
        let err = EngineError::Cancelled {
            message: "shutdown".into(),
        };
        assert!(err.context().is_empty());
        assert_eq!(err.code(), "cancelled");
    }

    #[test]
    fn to_record_round_trips_through_json() {
        let err = EngineError::invalid_argument("bad limit");
        let record = err.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: ErrorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, "invalid_argument");
    }
}
