//! Parameter semantics analyzer: purpose classification, usage tracking, and
//! validation-rule inference, all driven by fixed regex tables over a
//! function body's source text (the same `Lazy<Regex>` idiom used for
//! intent classification).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed classification of why a parameter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPurpose {
    Input,
    Config,
    Callback,
    Context,
    Output,
    Unknown,
}

/// Closed classification of how a parameter is used inside a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterUsage {
    Read,
    Write,
    Call,
    Passed,
    PropertyAccess,
    Spread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub declared_type: Option<String>,
    pub optional: bool,
    pub default_expression: Option<String>,
    pub is_rest: bool,
    pub is_destructured: bool,
    pub purpose: ParameterPurpose,
    pub usages: Vec<ParameterUsage>,
    pub validation_rules: Vec<String>,
}

static CALLABLE_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(->\s*\(|Fn\(|FnMut\(|FnOnce\(|=>\s*(void|any)|Callback)").unwrap());

static CALLBACK_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(on[A-Z]\w*|callback|cb)$").unwrap());
static CONFIG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(config|options|opts|settings)$").unwrap());
static CONTEXT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(ctx|context)$").unwrap());
static OUTPUT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(out|output|result)$").unwrap());

/// Predicate-shape → human-readable validation tag, checked against the text
/// immediately surrounding a parameter reference inside an `if`/`throw`
/// (or Rust `if`/`return Err`) construct.
static VALIDATION_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)(==\s*null|is\s+none|\.is_none\(\))").unwrap(), "non-null"),
        (Regex::new(r"(?i)(typeof\s+\w+\s*!==?\s*['\"]string['\"]|isinstance\(.+,\s*str\))").unwrap(), "must be string"),
        (Regex::new(r"(?i)(\.length\s*===?\s*0|len\(.+\)\s*==\s*0|\.is_empty\(\))").unwrap(), "non-empty"),
        (Regex::new(r"(?i)(<\s*0|<=\s*0)").unwrap(), "positive"),
    ]
});

fn classify_by_name(name: &str) -> ParameterPurpose {
    if CALLBACK_NAME.is_match(name) {
        ParameterPurpose::Callback
    } else if CONFIG_NAME.is_match(name) {
        ParameterPurpose::Config
    } else if CONTEXT_NAME.is_match(name) {
        ParameterPurpose::Context
    } else if OUTPUT_NAME.is_match(name) {
        ParameterPurpose::Output
    } else {
        ParameterPurpose::Input
    }
}

/// Pure parameter analyzer operating over a function/method's source text.
/// A textual approximation (rather than a full tree-sitter query) of
/// declared-type-then-name-then-default classification, using the same
/// regex-table idiom as the hybrid search intent classifier.
pub struct ParameterAnalyzer;

static SIGNATURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\(([^)]*)\)").unwrap());
static PARAM_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*(?![^<]*>)").unwrap());

impl ParameterAnalyzer {
    pub fn analyze(function_text: &str) -> Vec<Parameter> {
        let Some(captures) = SIGNATURE.captures(function_text) else {
            return Vec::new();
        };
        let raw = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        if raw.trim().is_empty() {
            return Vec::new();
        }

        let mut params = Vec::new();
        for raw_param in PARAM_SPLIT.split(raw) {
            let raw_param = raw_param.trim();
            if raw_param.is_empty() || raw_param == "&self" || raw_param == "self" || raw_param == "&mut self" {
                continue;
            }

            let is_rest = raw_param.starts_with("...") || raw_param.starts_with("&[");
            let is_destructured = raw_param.starts_with('{') || raw_param.starts_with('(');
            let (name_part, type_part) = raw_param.split_once(':').unwrap_or((raw_param, ""));
            let (default_expression, name_part) = match name_part.split_once('=') {
                Some((n, d)) => (Some(d.trim().to_string()), n.trim()),
                None => (None, name_part.trim()),
            };
            let optional = name_part.ends_with('?') || default_expression.is_some();
            let name = name_part.trim_end_matches('?').trim_start_matches("...").to_string();
            let declared_type = if type_part.trim().is_empty() {
                None
            } else {
                Some(type_part.trim().trim_end_matches('?').to_string())
            };

            let purpose = match &declared_type {
                Some(t) if CALLABLE_TYPE.is_match(t) => ParameterPurpose::Callback,
                _ => classify_by_name(&name),
            };

            let usages = Self::classify_usages(&name, function_text);
            let validation_rules = Self::infer_validation_rules(&name, function_text);

            params.push(Parameter {
                name,
                declared_type,
                optional,
                default_expression,
                is_rest,
                is_destructured,
                purpose,
                usages,
                validation_rules,
            });
        }

        params
    }

    fn classify_usages(name: &str, body: &str) -> Vec<ParameterUsage> {
        if name.is_empty() {
            return Vec::new();
        }
        let mut usages = Vec::new();
        let call_pattern = format!(r"\b{}\s*\(", regex::escape(name));
        let write_pattern = format!(r"\b{}\s*=\s*[^=]", regex::escape(name));
        let property_pattern = format!(r"\b{}\.\w+", regex::escape(name));
        let spread_pattern = format!(r"\.\.\.{}\b|\.\.{}\b", regex::escape(name), regex::escape(name));
        let passed_pattern = format!(r"\(\s*{}\s*[,)]|,\s*{}\s*[,)]", regex::escape(name), regex::escape(name));

        if Regex::new(&call_pattern).unwrap().is_match(body) {
            usages.push(ParameterUsage::Call);
        }
        if Regex::new(&write_pattern).unwrap().is_match(body) {
            usages.push(ParameterUsage::Write);
        }
        if Regex::new(&property_pattern).unwrap().is_match(body) {
            usages.push(ParameterUsage::PropertyAccess);
        }
        if Regex::new(&spread_pattern).unwrap().is_match(body) {
            usages.push(ParameterUsage::Spread);
        }
        if Regex::new(&passed_pattern).unwrap().is_match(body) {
            usages.push(ParameterUsage::Passed);
        }
        if usages.is_empty() && Regex::new(&format!(r"\b{}\b", regex::escape(name))).unwrap().is_match(body) {
            usages.push(ParameterUsage::Read);
        }
        usages
    }

    fn infer_validation_rules(name: &str, body: &str) -> Vec<String> {
        let guard_pattern = Regex::new(&format!(
            r"(?m)^.*\b{}\b.*$",
            regex::escape(name)
        ))
        .unwrap();

        let mut tags = Vec::new();
        for line in body.lines() {
            if !guard_pattern.is_match(line) {
                continue;
            }
            if !(line.contains("if ") || line.contains("throw") || line.contains("return Err")) {
                continue;
            }
            for (pattern, tag) in VALIDATION_RULES.iter() {
                if pattern.is_match(line) && !tags.contains(&tag.to_string()) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }
}
