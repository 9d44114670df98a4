//! Walks a parsed syntax tree and produces entities, edges, and the three
//! per-function auxiliary analyses (parameters, side effects, error paths).

pub mod error_paths;
pub mod params;
pub mod side_effects;

use crate::error::{EngineError, Result};
use crate::model::{CodeEntity, Edge, EdgeKind, EntityKind};
use crate::parsing::{CodeParser, ParsedSymbol, SupportedLanguage, SymbolType};
use crate::types::ValidatedDocumentId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub use error_paths::{ErrorPath, ErrorPathAnalyzer, HandlingStrategy};
pub use params::{Parameter, ParameterAnalyzer, ParameterPurpose, ParameterUsage};
pub use side_effects::{SideEffect, SideEffectCategory, SideEffectDetector, SideEffectOptions};

/// Everything extracted from a single parsed file.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub entities: Vec<CodeEntity>,
    pub edges: Vec<Edge>,
    pub parameters: HashMap<ValidatedDocumentId, Vec<Parameter>>,
    pub side_effects: HashMap<ValidatedDocumentId, Vec<SideEffect>>,
    pub error_paths: HashMap<ValidatedDocumentId, Vec<ErrorPath>>,
}

fn symbol_kind_to_entity_kind(kind: &SymbolType) -> Option<EntityKind> {
    match kind {
        SymbolType::Function => Some(EntityKind::Function),
        SymbolType::Method => Some(EntityKind::Method),
        SymbolType::Class | SymbolType::Struct => Some(EntityKind::Class),
        SymbolType::Interface => Some(EntityKind::Interface),
        SymbolType::TypeAlias => Some(EntityKind::TypeAlias),
        SymbolType::Variable | SymbolType::Constant => Some(EntityKind::Variable),
        _ => None,
    }
}

// `extends`/`implements X` (TypeScript, Java-style interfaces) on the
// class/interface header line.
static EXTENDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:extends|implements)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
// Python's `class Name(Base):` base-class list.
static PY_BASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"class\s+\w+\(\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());
// A call-shaped identifier: `name(`.
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());
// A quoted module path, as in `import x from '...'` or `require('...')`.
static IMPORT_QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());
// Rust's `use a::b::c;` / Python's `import a.b` / `from a.b import c`.
static IMPORT_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:use|import|from)\s+([\w:.]+)").unwrap());

/// Reads the supertype name off a class/interface header line, trying the
/// `extends`/`implements`-keyword shape before Python's base-class parens.
fn extends_target(header: &str) -> Option<String> {
    EXTENDS_RE
        .captures(header)
        .or_else(|| PY_BASE_RE.captures(header))
        .map(|caps| caps[1].to_string())
}

/// Resolves the module path an import statement names: a quoted path if
/// present (JS/TS `import`/`require`), else the bare path after
/// `use`/`import`/`from` (Rust/Python), else the statement text itself.
fn import_target(text: &str) -> String {
    if let Some(caps) = IMPORT_QUOTED_RE.captures(text) {
        return caps[1].to_string();
    }
    if let Some(caps) = IMPORT_BARE_RE.captures(text) {
        return caps[1].to_string();
    }
    text.trim().trim_end_matches(';').to_string()
}

/// Extracts entities and containment edges from parsed symbols, and runs the
/// three auxiliary analyzers over every function/method body. Re-extracting
/// identical bytes is idempotent modulo IDs for newly-inserted entities: the
/// same `(file_id, kind, name, start_line)` identity tuple always derives the
/// same entity ID (see [`CodeEntity::derive_id`]).
pub struct Extractor {
    parser: CodeParser,
    side_effect_options: SideEffectOptions,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        let parser = CodeParser::new().map_err(|e| EngineError::Parse {
            file: String::new(),
            line: 0,
            column: 0,
            message: e.to_string(),
        })?;
        Ok(Self {
            parser,
            side_effect_options: SideEffectOptions::default(),
        })
    }

    pub fn with_side_effect_options(mut self, options: SideEffectOptions) -> Self {
        self.side_effect_options = options;
        self
    }

    pub fn extract(
        &mut self,
        file_id: ValidatedDocumentId,
        content: &str,
        language: SupportedLanguage,
    ) -> Result<ExtractionResult> {
        let parsed = self
            .parser
            .parse_content(content, language)
            .map_err(|e| EngineError::Parse {
                file: String::new(),
                line: 0,
                column: 0,
                message: e.to_string(),
            })?;

        let mut result = ExtractionResult::default();
        let mut disambiguators: HashMap<(EntityKind, String, u32), u32> = HashMap::new();
        let mut class_stack: Vec<(usize, String)> = Vec::new();
        // (entity id, supertype name) pairs awaiting resolution against the
        // full entity set, since a base class may be declared later in the
        // file than the subclass that extends it.
        let mut pending_extends: Vec<(ValidatedDocumentId, String)> = Vec::new();

        for symbol in &parsed.symbols {
            if symbol.symbol_type == SymbolType::Import {
                let target = import_target(&symbol.text);
                let mut meta = HashMap::new();
                meta.insert("target".to_string(), target.clone());
                result.edges.push(Edge {
                    from_id: file_id,
                    to_id: CodeEntity::derive_external_id("import", &target),
                    kind: EdgeKind::Imports,
                    meta: Some(meta),
                });
                continue;
            }

            let Some(kind) = symbol_kind_to_entity_kind(&symbol.symbol_type) else {
                continue;
            };

            while let Some((end, _)) = class_stack.last() {
                if symbol.start_line > *end {
                    class_stack.pop();
                } else {
                    break;
                }
            }

            let start_line = symbol.start_line as u32;
            let key = (kind, symbol.name.clone(), start_line);
            let disambiguator = disambiguators.entry(key).or_insert(0);
            let entity_id =
                CodeEntity::derive_id(file_id, kind, &symbol.name, start_line, *disambiguator);
            *disambiguator += 1;

            let class_of = if kind == EntityKind::Method {
                class_stack.last().map(|(_, name)| name.clone())
            } else {
                None
            };

            let header = symbol.text.lines().next().unwrap_or("").trim().to_string();
            let extends = if matches!(kind, EntityKind::Class | EntityKind::Interface) {
                extends_target(&header)
            } else {
                None
            };
            if let Some(base) = &extends {
                pending_extends.push((entity_id, base.clone()));
            }

            let entity = CodeEntity {
                id: entity_id,
                kind,
                name: symbol.name.clone(),
                file_id,
                start_line,
                end_line: symbol.end_line as u32,
                signature: Some(header),
                source_code: Some(symbol.text.clone()),
                class_of,
                extends,
            };

            result.edges.push(Edge {
                from_id: file_id,
                to_id: entity_id,
                kind: EdgeKind::Contains,
                meta: None,
            });

            if matches!(kind, EntityKind::Class | EntityKind::Interface) {
                class_stack.push((symbol.end_line, symbol.name.clone()));
            }

            if matches!(kind, EntityKind::Function | EntityKind::Method) {
                result
                    .parameters
                    .insert(entity_id, ParameterAnalyzer::analyze(&symbol.text));
                result.side_effects.insert(
                    entity_id,
                    SideEffectDetector::new(self.side_effect_options.clone()).scan(&symbol.text),
                );
                result
                    .error_paths
                    .insert(entity_id, ErrorPathAnalyzer::analyze(&symbol.text));
            }

            result.entities.push(entity);
        }

        // Name resolution against the full entity set happens only once
        // every symbol has been visited, so forward references (a base
        // class or callee declared later in the file) still resolve.
        let mut by_name: HashMap<&str, Vec<(ValidatedDocumentId, EntityKind)>> = HashMap::new();
        for entity in &result.entities {
            by_name
                .entry(entity.name.as_str())
                .or_default()
                .push((entity.id, entity.kind));
        }

        for (subclass_id, base_name) in &pending_extends {
            if let Some(candidates) = by_name.get(base_name.as_str()) {
                for (base_id, base_kind) in candidates {
                    if matches!(base_kind, EntityKind::Class | EntityKind::Interface) {
                        result.edges.push(Edge {
                            from_id: *subclass_id,
                            to_id: *base_id,
                            kind: EdgeKind::Extends,
                            meta: None,
                        });
                    }
                }
            }
        }

        let mut seen_calls: HashSet<(ValidatedDocumentId, ValidatedDocumentId)> = HashSet::new();
        for caller in &result.entities {
            if !matches!(caller.kind, EntityKind::Function | EntityKind::Method) {
                continue;
            }
            let Some(body) = &caller.source_code else {
                continue;
            };
            // Skip the signature line so a function doesn't register a call
            // to itself from its own declaration.
            let body_without_signature = body.splitn(2, '\n').nth(1).unwrap_or("");
            for caps in CALL_RE.captures_iter(body_without_signature) {
                let callee_name = &caps[1];
                if callee_name == caller.name {
                    continue;
                }
                let Some(candidates) = by_name.get(callee_name) else {
                    continue;
                };
                for (callee_id, callee_kind) in candidates {
                    if !matches!(callee_kind, EntityKind::Function | EntityKind::Method) {
                        continue;
                    }
                    if seen_calls.insert((caller.id, *callee_id)) {
                        result.edges.push(Edge {
                            from_id: caller.id,
                            to_id: *callee_id,
                            kind: EdgeKind::Calls,
                            meta: None,
                        });
                    }
                }
            }
        }

        Ok(result)
    }
}
