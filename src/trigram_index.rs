//! Trigram extraction and relevance scoring: the pure, allocation-light
//! primitives that back [`crate::hybrid_search::TrigramLexicalEngine`].

use std::collections::HashMap;

/// Namespace for the trigram scoring functions. Carries no state of its
/// own; indexing and caching of per-entity trigram sets live in
/// `hybrid_search::TrigramLexicalEngine`.
pub struct TrigramIndex;

impl TrigramIndex {
    /// Extract trigrams from text.
    ///
    /// Converts text to lowercase and extracts all 3-character sequences.
    /// Returns ALL trigrams including duplicates to preserve frequency
    /// information; trigrams made up entirely of whitespace/punctuation are
    /// skipped.
    pub fn extract_trigrams(text: &str) -> Vec<String> {
        let normalized = text.to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();

        if chars.len() < 3 {
            return Vec::new();
        }

        let mut trigrams = Vec::with_capacity(chars.len() - 2);
        for i in 0..=(chars.len() - 3) {
            let trigram: String = chars[i..i + 3].iter().collect();
            if trigram.chars().any(|c| c.is_alphanumeric()) {
                trigrams.push(trigram);
            }
        }

        trigrams
    }

    /// Calculate simple relevance score for a document, rebuilding the
    /// document's trigram frequency map on every call.
    pub fn calculate_relevance_score(
        query_trigrams: &[String],
        doc_trigrams: &[String],
        word_count: usize,
    ) -> f64 {
        if query_trigrams.is_empty() || doc_trigrams.is_empty() {
            return 0.0;
        }

        let mut doc_trigram_freq: HashMap<&String, usize> = HashMap::new();
        for trigram in doc_trigrams {
            *doc_trigram_freq.entry(trigram).or_insert(0) += 1;
        }

        let mut total_matches = 0;
        let mut unique_matches = 0;
        for query_trigram in query_trigrams {
            if let Some(&freq) = doc_trigram_freq.get(query_trigram) {
                unique_matches += 1;
                total_matches += freq;
            }
        }

        if unique_matches == 0 {
            return 0.0;
        }

        let coverage = unique_matches as f64 / query_trigrams.len() as f64;
        let frequency_score = total_matches as f64;
        let length_factor = if word_count > 0 {
            1.0 / (1.0 + (word_count as f64 / 100.0).ln())
        } else {
            1.0
        };

        (coverage * 10.0) + frequency_score + (length_factor * 5.0)
    }

    /// Relevance score calculation using a pre-computed frequency map, so
    /// callers that keep a per-entity trigram index don't rebuild it per
    /// query.
    pub fn calculate_relevance_score_optimized(
        query_trigrams: &[String],
        doc_trigram_freq: &HashMap<String, usize>,
        word_count: usize,
    ) -> f64 {
        if query_trigrams.is_empty() || doc_trigram_freq.is_empty() {
            return 0.0;
        }

        let mut total_matches = 0;
        let mut unique_matches = 0;
        for query_trigram in query_trigrams {
            if let Some(&freq) = doc_trigram_freq.get(query_trigram) {
                unique_matches += 1;
                total_matches += freq;
            }
        }

        if unique_matches == 0 {
            return 0.0;
        }

        let coverage = unique_matches as f64 / query_trigrams.len() as f64;
        let frequency_score = total_matches as f64;
        let length_factor = if word_count > 0 {
            1.0 / (1.0 + (word_count as f64 / 100.0).ln())
        } else {
            1.0
        };

        (coverage * 10.0) + frequency_score + (length_factor * 5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_trigram_extraction() {
        let text = "hello world";
        let trigrams = TrigramIndex::extract_trigrams(text);

        let unique_trigrams: HashSet<String> = trigrams.into_iter().collect();
        assert!(unique_trigrams.contains("hel"));
        assert!(unique_trigrams.contains("ell"));
        assert!(unique_trigrams.contains("llo"));
        assert!(unique_trigrams.contains("wor"));
        assert!(unique_trigrams.contains("orl"));
        assert!(unique_trigrams.contains("rld"));
    }

    #[test]
    fn test_trigram_extraction_short_text() {
        let text = "hi";
        let trigrams = TrigramIndex::extract_trigrams(text);
        assert!(trigrams.is_empty());
    }

    #[test]
    fn test_trigram_extraction_normalization() {
        let text = "Hello WORLD";
        let trigrams = TrigramIndex::extract_trigrams(text);
        let unique_trigrams: HashSet<String> = trigrams.into_iter().collect();

        assert!(unique_trigrams.contains("hel"));
        assert!(unique_trigrams.contains("wor"));
        assert!(!unique_trigrams.contains("HEL"));
        assert!(!unique_trigrams.contains("WOR"));
    }

    #[test]
    fn relevance_score_rewards_coverage_and_frequency() {
        let query = TrigramIndex::extract_trigrams("search");
        let doc = TrigramIndex::extract_trigrams("search search search unrelated");
        let score = TrigramIndex::calculate_relevance_score(&query, &doc, 4);
        assert!(score > 0.0);
    }

    #[test]
    fn relevance_score_zero_when_no_overlap() {
        let query = TrigramIndex::extract_trigrams("xyz");
        let doc = TrigramIndex::extract_trigrams("abc def ghi");
        assert_eq!(TrigramIndex::calculate_relevance_score(&query, &doc, 3), 0.0);
    }

    #[test]
    fn optimized_score_matches_naive_score() {
        let query = TrigramIndex::extract_trigrams("hello world");
        let doc = TrigramIndex::extract_trigrams("hello there world");
        let mut freq: HashMap<String, usize> = HashMap::new();
        for t in &doc {
            *freq.entry(t.clone()).or_insert(0) += 1;
        }
        let naive = TrigramIndex::calculate_relevance_score(&query, &doc, 3);
        let optimized = TrigramIndex::calculate_relevance_score_optimized(&query, &freq, 3);
        assert!((naive - optimized).abs() < f64::EPSILON);
    }
}
