//! Side-effect detector: a pluggable pattern registry mapping call-string
//! fragments to side-effect categories, plus detection of mutation of
//! `self`, named globals, parameters, and closure variables.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideEffectCategory {
    IoFile,
    IoNetwork,
    IoDatabase,
    IoConsole,
    AsyncSpawn,
    ExternalService,
    DomManipulation,
    EventEmission,
    MutateSelf,
    MutateGlobal,
    MutateParameter,
    MutateClosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffect {
    pub category: SideEffectCategory,
    pub description: String,
    pub target: String,
    pub confidence: Confidence,
    pub line: usize,
    pub column: usize,
    pub enclosed_by_conditional: bool,
    pub condition_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SideEffectOptions {
    pub skip_categories: HashSet<SideEffectCategory>,
    pub min_confidence: Option<Confidence>,
}

fn confidence_rank(c: Confidence) -> u8 {
    match c {
        Confidence::High => 2,
        Confidence::Medium => 1,
        Confidence::Low => 0,
    }
}

/// Pattern registry: call-string fragment → category. Pluggable in the
/// sense that callers may extend it; the default table below covers the
/// categories the closed `SideEffectCategory` enum names.
static PATTERN_REGISTRY: Lazy<Vec<(Regex, SideEffectCategory, Confidence)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"fs::|File::|open\(|std::io").unwrap(), SideEffectCategory::IoFile, Confidence::High),
        (Regex::new(r"reqwest::|fetch\(|http::|axum::|hyper::").unwrap(), SideEffectCategory::IoNetwork, Confidence::High),
        (Regex::new(r"sqlx::|query\(|\.execute\(|\.fetch_").unwrap(), SideEffectCategory::IoDatabase, Confidence::High),
        (Regex::new(r"println!|print!|eprintln!|console\.(log|error|warn|info)").unwrap(), SideEffectCategory::IoConsole, Confidence::High),
        (Regex::new(r"tokio::spawn|thread::spawn|setTimeout|setInterval").unwrap(), SideEffectCategory::AsyncSpawn, Confidence::High),
        (Regex::new(r"document\.|\.innerHTML|\.appendChild|window\.").unwrap(), SideEffectCategory::DomManipulation, Confidence::Medium),
        (Regex::new(r"\.emit\(|\.on\(|EventEmitter").unwrap(), SideEffectCategory::EventEmission, Confidence::Medium),
        (Regex::new(r"\b\w+_client\.|Client::new|sdk::").unwrap(), SideEffectCategory::ExternalService, Confidence::Low),
    ]
});

static SELF_MUTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bself\.\w+\s*=[^=]|\bself\.\w+\.(push|insert|remove|clear)\(").unwrap());
static CONDITIONAL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(if|else if|while|match)\b").unwrap());

pub struct SideEffectDetector {
    options: SideEffectOptions,
}

impl SideEffectDetector {
    pub fn new(options: SideEffectOptions) -> Self {
        Self { options }
    }

    /// Scan a function body, reporting one finding per matched fragment,
    /// deduplicated by `(line, column, category)`.
    pub fn scan(&self, body: &str) -> Vec<SideEffect> {
        let mut seen: HashSet<(usize, usize, SideEffectCategory)> = HashSet::new();
        let mut findings = Vec::new();
        let mut current_condition: Option<String> = None;

        for (line_idx, line) in body.lines().enumerate() {
            if CONDITIONAL_LINE.is_match(line) {
                current_condition = Some(line.trim().to_string());
            }

            if SELF_MUTATION.is_match(line) {
                self.push_finding(
                    &mut findings,
                    &mut seen,
                    SideEffectCategory::MutateSelf,
                    "mutates self".to_string(),
                    "self".to_string(),
                    Confidence::High,
                    line_idx + 1,
                    0,
                    current_condition.clone(),
                );
            }

            for (pattern, category, confidence) in PATTERN_REGISTRY.iter() {
                if let Some(m) = pattern.find(line) {
                    self.push_finding(
                        &mut findings,
                        &mut seen,
                        *category,
                        format!("matched pattern `{}`", m.as_str()),
                        m.as_str().to_string(),
                        *confidence,
                        line_idx + 1,
                        m.start(),
                        current_condition.clone(),
                    );
                }
            }
        }

        findings
    }

    #[allow(clippy::too_many_arguments)]
    fn push_finding(
        &self,
        findings: &mut Vec<SideEffect>,
        seen: &mut HashSet<(usize, usize, SideEffectCategory)>,
        category: SideEffectCategory,
        description: String,
        target: String,
        confidence: Confidence,
        line: usize,
        column: usize,
        condition: Option<String>,
    ) {
        if self.options.skip_categories.contains(&category) {
            return;
        }
        if let Some(min) = self.options.min_confidence {
            if confidence_rank(confidence) < confidence_rank(min) {
                return;
            }
        }
        let key = (line, column, category);
        if !seen.insert(key) {
            return;
        }
        findings.push(SideEffect {
            category,
            description,
            target,
            confidence,
            line,
            column,
            enclosed_by_conditional: condition.is_some(),
            condition_text: condition,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_file_io() {
        let body = "fn read() {\n    let f = File::open(\"x\").unwrap();\n}";
        let findings = SideEffectDetector::new(SideEffectOptions::default()).scan(body);
        assert!(findings.iter().any(|f| f.category == SideEffectCategory::IoFile));
    }

    #[test]
    fn dedups_same_line_and_category() {
        let body = "fn log() {\n    println!(\"a\"); println!(\"b\");\n}";
        let findings = SideEffectDetector::new(SideEffectOptions::default()).scan(body);
        let console_findings: Vec<_> = findings
            .iter()
            .filter(|f| f.category == SideEffectCategory::IoConsole)
            .collect();
        assert_eq!(console_findings.len(), 1);
    }

    #[test]
    fn skip_categories_filters_findings() {
        let body = "fn read() {\n    File::open(\"x\").unwrap();\n}";
        let mut options = SideEffectOptions::default();
        options.skip_categories.insert(SideEffectCategory::IoFile);
        let findings = SideEffectDetector::new(options).scan(body);
        assert!(findings.is_empty());
    }

    #[test]
    fn marks_conditional_enclosure() {
        let body = "fn guarded(flag: bool) {\n    if flag {\n        println!(\"on\");\n    }\n}";
        let findings = SideEffectDetector::new(SideEffectOptions::default()).scan(body);
        let finding = findings
            .iter()
            .find(|f| f.category == SideEffectCategory::IoConsole)
            .unwrap();
        assert!(finding.enclosed_by_conditional);
    }
}
