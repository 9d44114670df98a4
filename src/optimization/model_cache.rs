//! LRU cache of model responses keyed by a hash of `(model_id, prompt,
//! options)`, carrying token/cost accounting alongside the cached value.

use super::lru::LruCache;
use crate::hasher::hash_content;
use std::collections::{HashMap, HashSet};

pub fn model_cache_key(model_id: &str, prompt: &str, options_repr: &str) -> String {
    let seed = format!("{model_id}\u{0}{prompt}\u{0}{options_repr}");
    hash_content(seed.as_bytes()).to_string()
}

#[derive(Debug, Clone)]
pub struct CachedModelResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

pub struct ModelCache {
    cache: LruCache<String, CachedModelResponse>,
    keys_by_model: HashMap<String, HashSet<String>>,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            keys_by_model: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&CachedModelResponse> {
        self.cache.get(&key.to_string())
    }

    pub fn put(&mut self, model_id: &str, key: String, response: CachedModelResponse) {
        self.keys_by_model
            .entry(model_id.to_string())
            .or_default()
            .insert(key.clone());
        self.cache.put(key, response);
    }

    /// Drops every cached response produced by `model_id`, e.g. after a
    /// model config changes or the model is disabled by the feedback loop.
    pub fn invalidate_by_model(&mut self, model_id: &str) {
        if let Some(keys) = self.keys_by_model.remove(model_id) {
            for key in keys {
                self.cache.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_by_model_clears_only_that_models_entries() {
        let mut cache = ModelCache::new(10);
        let key_a = model_cache_key("model-a", "hello", "{}");
        let key_b = model_cache_key("model-b", "hello", "{}");
        cache.put(
            "model-a",
            key_a.clone(),
            CachedModelResponse {
                text: "hi".into(),
                input_tokens: 1,
                output_tokens: 1,
                cost: 0.001,
            },
        );
        cache.put(
            "model-b",
            key_b.clone(),
            CachedModelResponse {
                text: "hi".into(),
                input_tokens: 1,
                output_tokens: 1,
                cost: 0.002,
            },
        );

        cache.invalidate_by_model("model-a");
        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());
    }
}
