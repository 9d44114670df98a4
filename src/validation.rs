// Validation Layer: runtime checks backing the `Validated*` newtypes in
// `crate::types`, plus the tag/page-id rules the store and extractor rely on.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;

/// Validation errors with detailed context
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Precondition failed: {condition}")]
    PreconditionFailed { condition: String, context: String },

    #[error("Postcondition failed: {condition}")]
    PostconditionFailed { condition: String, context: String },

    #[error("Invariant violated: {invariant}")]
    InvariantViolated { invariant: String, state: String },

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },
}

/// Validation context for better error messages
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(self, condition: bool, message: &str) -> Result<()> {
        if !condition {
            let context = format!(
                "Operation: {}, Attributes: {:?}",
                self.operation, self.attributes
            );
            bail!(ValidationError::PreconditionFailed {
                condition: message.to_string(),
                context,
            });
        }
        Ok(())
    }
}

/// Path validation with detailed checks
pub mod path {
    use super::*;
    use std::ffi::OsStr;

    /// Maximum path length across platforms
    const MAX_PATH_LENGTH: usize = 4096;

    /// Reserved filenames on Windows
    const RESERVED_NAMES: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    /// Validate a file path for storage
    pub fn validate_file_path(path: &str) -> Result<()> {
        let ctx = ValidationContext::new("validate_file_path").with_attribute("path", path);

        ctx.clone()
            .validate(!path.is_empty(), "Path cannot be empty")?;

        ctx.clone().validate(
            path.len() < MAX_PATH_LENGTH,
            &format!("Path exceeds maximum length of {MAX_PATH_LENGTH}"),
        )?;

        ctx.clone()
            .validate(!path.contains('\0'), "Path contains null bytes")?;

        let path_obj = Path::new(path);

        for component in path_obj.components() {
            if let std::path::Component::ParentDir = component {
                bail!(ValidationError::InvalidInput {
                    field: "path".to_string(),
                    reason: "Parent directory references (..) not allowed".to_string(),
                });
            }
        }

        if let Some(stem) = path_obj.file_stem().and_then(OsStr::to_str) {
            let upper = stem.to_uppercase();
            if RESERVED_NAMES.contains(&upper.as_str()) {
                bail!(ValidationError::InvalidInput {
                    field: "path".to_string(),
                    reason: format!("Reserved filename: {stem}"),
                });
            }
        }

        if path_obj.to_str().is_none() {
            bail!(ValidationError::InvalidInput {
                field: "path".to_string(),
                reason: "Path is not valid UTF-8".to_string(),
            });
        }

        Ok(())
    }

    /// Validate a directory path
    pub fn validate_directory_path(path: &str) -> Result<()> {
        validate_file_path(path)?;

        let path_obj = Path::new(path);
        if path_obj.extension().is_some() {
            bail!(ValidationError::InvalidInput {
                field: "path".to_string(),
                reason: "Directory path should not have file extension".to_string(),
            });
        }

        Ok(())
    }
}

/// Index validation
pub mod index {
    use super::*;

    /// Validate trigram extraction
    pub fn validate_trigram(text: &str) -> Result<()> {
        let ctx = ValidationContext::new("trigram_extraction")
            .with_attribute("text_length", text.len().to_string());

        ctx.clone().validate(
            text.len() >= 3,
            "Text too short for trigram extraction (min 3 chars)",
        )?;

        ctx.validate(
            text.len() < 1024 * 1024,
            "Text too long for trigram extraction (max 1MB)",
        )?;

        Ok(())
    }

    /// Validate search query
    pub fn validate_search_query(query: &str) -> Result<()> {
        let ctx = ValidationContext::new("search_query").with_attribute("query", query);

        ctx.clone()
            .validate(!query.trim().is_empty(), "Search query cannot be empty")?;

        ctx.validate(query.len() < 1024, "Search query too long (max 1024 chars)")?;

        Ok(())
    }

    /// Validate tag
    pub fn validate_tag(tag: &str) -> Result<()> {
        let ctx = ValidationContext::new("tag_validation").with_attribute("tag", tag);

        ctx.clone()
            .validate(!tag.trim().is_empty(), "Tag cannot be empty")?;

        ctx.clone()
            .validate(tag.len() < 128, "Tag too long (max 128 chars)")?;

        let valid_chars = tag
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ');

        ctx.validate(valid_chars, "Tag contains invalid characters")?;

        Ok(())
    }
}

/// Storage state validation
pub mod storage {
    use super::*;

    /// Validate page allocation
    pub fn validate_page_id(id: u64) -> Result<()> {
        let ctx =
            ValidationContext::new("page_allocation").with_attribute("page_id", id.to_string());

        ctx.clone().validate(id > 0, "Page ID must be positive")?;

        ctx.validate(id < u64::MAX / 4096, "Page ID too large")?;

        Ok(())
    }
}
