//! Error-path analyzer: pairs throw/raise/return-Err sites with their
//! nearest enclosing handler and classifies the handling strategy.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlingStrategy {
    Rethrow,
    Return,
    Log,
    Handle,
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPath {
    pub line: usize,
    pub error_type: String,
    pub condition_text: Option<String>,
    pub handling_strategy: HandlingStrategy,
    pub recovery_description: String,
    pub escapes_function: bool,
}

static THROW_SITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:throw\s+new\s+(\w+)|raise\s+(\w+)|return\s+Err\((\w+)?)").unwrap());
static CATCH_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:catch\s*\(|except\b|Err\(\w*\)\s*=>|match\s+\w+\s*\{[^}]*Err)").unwrap());
static IF_GUARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(if|else if)\b(.*)$").unwrap());

/// Substring-match heuristic for the "catch-log" classification: a catch
/// body mentioning `console`, `log`, or `logger` is classified `Log`. This
/// preserves the documented ambiguity — user code with those identifiers in
/// an unrelated sense is misclassified by design, not by oversight.
fn classify_handling(catch_body: &str) -> HandlingStrategy {
    let lower = catch_body.to_lowercase();
    if lower.contains("console") || lower.contains("logger") || lower.contains("log.") || lower.contains("log!") {
        HandlingStrategy::Log
    } else if lower.contains("throw") || lower.contains("raise") || lower.contains("return err") {
        HandlingStrategy::Rethrow
    } else if lower.contains("return") {
        HandlingStrategy::Return
    } else if catch_body.trim().is_empty() {
        HandlingStrategy::Ignore
    } else {
        HandlingStrategy::Handle
    }
}

pub struct ErrorPathAnalyzer;

impl ErrorPathAnalyzer {
    pub fn analyze(function_text: &str) -> Vec<ErrorPath> {
        let lines: Vec<&str> = function_text.lines().collect();
        let mut paths = Vec::new();
        let mut nearest_condition: Option<String> = None;

        for (idx, line) in lines.iter().enumerate() {
            if let Some(caps) = IF_GUARD.captures(line) {
                nearest_condition = Some(caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string());
            }

            let Some(caps) = THROW_SITE.captures(line) else {
                continue;
            };

            let error_type = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Error".to_string());

            // Nearest enclosing catch/handler: scan forward from the throw
            // site for the first catch-shaped line, within the remainder of
            // the function body.
            let enclosing_catch = lines[idx..]
                .iter()
                .position(|l| CATCH_BLOCK.is_match(l))
                .map(|offset| lines[idx + offset..].join("\n"));

            let handling_strategy = enclosing_catch
                .as_deref()
                .map(classify_handling)
                .unwrap_or(HandlingStrategy::Rethrow);

            let escapes_function = enclosing_catch.is_none();

            let recovery_description = match handling_strategy {
                HandlingStrategy::Rethrow => "propagates to caller".to_string(),
                HandlingStrategy::Return => "returns a default/fallback value".to_string(),
                HandlingStrategy::Log => "logs and continues".to_string(),
                HandlingStrategy::Handle => "handles inline".to_string(),
                HandlingStrategy::Ignore => "swallows silently".to_string(),
            };

            paths.push(ErrorPath {
                line: idx + 1,
                error_type,
                condition_text: nearest_condition.clone(),
                handling_strategy,
                recovery_description,
                escapes_function,
            });
        }

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncaught_throw_escapes_function() {
        let body = "fn parse() {\n    throw new ParseError(\"bad\");\n}";
        let paths = ErrorPathAnalyzer::analyze(body);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].escapes_function);
        assert_eq!(paths[0].handling_strategy, HandlingStrategy::Rethrow);
    }

    #[test]
    fn catch_with_logger_classified_as_log() {
        let body = "fn run() {\n    try {\n        throw new RunError();\n    } catch (e) {\n        logger.error(e);\n    }\n}";
        let paths = ErrorPathAnalyzer::analyze(body);
        assert_eq!(paths[0].handling_strategy, HandlingStrategy::Log);
        assert!(!paths[0].escapes_function);
    }

    #[test]
    fn records_guarding_condition() {
        let body = "fn validate(input: &str) {\n    if input.is_empty() {\n        return Err(ValidationError);\n    }\n}";
        let paths = ErrorPathAnalyzer::analyze(body);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].condition_text.as_deref().unwrap().contains("is_empty"));
    }
}
