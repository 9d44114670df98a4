//! LRU cache of query results keyed by a content hash of `(query, params)`,
//! with pattern- and dependency-based invalidation indexes on top of the
//! hand-rolled [`super::lru::LruCache`].

use super::lru::LruCache;
use crate::hasher::hash_content;
use std::collections::{HashMap, HashSet};

/// Stable cache key derived from the query text and its bound parameters'
/// debug representation; never the raw query re-used as a map key so two
/// structurally-identical calls with differently-ordered params still hit.
pub fn cache_key(query: &str, params_repr: &str) -> String {
    let seed = format!("{query}\u{0}{params_repr}");
    hash_content(seed.as_bytes()).to_string()
}

pub struct QueryCache<V> {
    cache: LruCache<String, V>,
    /// dependency tag -> set of cache keys that should be dropped when the
    /// tag is invalidated (e.g. "function" invalidates every query result
    /// that read function entities).
    dependencies: HashMap<String, HashSet<String>>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            dependencies: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.cache.get(&key.to_string())
    }

    /// Insert `value` under `key`, tagging it with `deps` so it can later
    /// be bulk-invalidated by `invalidate_by_dependency`.
    pub fn put(&mut self, key: String, value: V, deps: &[&str]) {
        for dep in deps {
            self.dependencies
                .entry(dep.to_string())
                .or_default()
                .insert(key.clone());
        }
        self.cache.put(key, value);
    }

    /// Evicts every cached entry tagged with `dependency`.
    pub fn invalidate_by_dependency(&mut self, dependency: &str) {
        if let Some(keys) = self.dependencies.remove(dependency) {
            for key in keys {
                self.cache.remove(&key);
            }
        }
    }

    /// Evicts every cached entry whose key contains `pattern` as a
    /// substring (e.g. a relation name embedded in the cache key's source
    /// query text, matched by the caller before constructing the key).
    pub fn invalidate_by_pattern<F>(&mut self, matches: F)
    where
        F: Fn(&str) -> bool,
    {
        let keys: Vec<String> = self
            .dependencies
            .values()
            .flatten()
            .filter(|k| matches(k))
            .cloned()
            .collect();
        for key in keys {
            self.cache.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(cache_key("q", "p"), cache_key("q", "p"));
        assert_ne!(cache_key("q", "p"), cache_key("q", "p2"));
    }

    #[test]
    fn invalidate_by_dependency_evicts_tagged_entries() {
        let mut cache: QueryCache<Vec<i32>> = QueryCache::new(10);
        let key = cache_key("select * from entities", "{}");
        cache.put(key.clone(), vec![1, 2, 3], &["function"]);
        assert!(cache.get(&key).is_some());

        cache.invalidate_by_dependency("function");
        assert!(cache.get(&key).is_none());
    }
}
