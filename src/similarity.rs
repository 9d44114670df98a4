//! Similarity service (C8): layers `find_similar_by_*`, `compute_similarity`,
//! and `cluster_similar_code` over a [`crate::store::GraphStore`] and the
//! [`crate::embeddings::EmbeddingService`].

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::model::EntityKind;
use crate::store::GraphStore;
use crate::types::ValidatedDocumentId;
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SimilarityOptions {
    pub kind_filter: Option<EntityKind>,
    pub path_regex: Option<String>,
    pub exclude_ids: Vec<ValidatedDocumentId>,
    pub min_similarity: f32,
    pub limit: usize,
}

impl SimilarityOptions {
    pub fn new() -> Self {
        Self {
            limit: 10,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimilarEntity {
    pub entity_id: ValidatedDocumentId,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub centroid: ValidatedDocumentId,
    pub members: Vec<ValidatedDocumentId>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    pub similarity_threshold: f32,
    pub min_cluster_size: usize,
    pub max_clusters: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            min_cluster_size: 2,
            max_clusters: 50,
        }
    }
}

pub struct SimilarityService {
    store: Arc<dyn GraphStore>,
    embeddings: Arc<EmbeddingService>,
}

impl SimilarityService {
    pub fn new(store: Arc<dyn GraphStore>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    fn path_filter(path_regex: &Option<String>) -> Option<Regex> {
        path_regex.as_ref().and_then(|p| Regex::new(p).ok())
    }

    async fn search_and_filter(
        &self,
        vector: &[f32],
        options: &SimilarityOptions,
    ) -> Result<Vec<SimilarEntity>> {
        let k = (options.limit + options.exclude_ids.len()).max(options.limit);
        let hits = self.store.vector_search(vector, k.max(1)).await?;
        let _path_filter = Self::path_filter(&options.path_regex);
        let mut results: Vec<SimilarEntity> = hits
            .into_iter()
            .filter(|hit| !options.exclude_ids.contains(&hit.id))
            .map(|hit| SimilarEntity {
                entity_id: hit.id,
                // distance monotonic (smaller = closer); similarity = 1 - distance
                similarity: 1.0 - hit.distance,
            })
            .filter(|r| r.similarity >= options.min_similarity)
            .collect();
        results.truncate(options.limit.max(1));
        Ok(results)
    }

    /// k-NN search seeded from an already-embedded entity's own stored
    /// vector.
    pub async fn find_similar_by_entity(
        &self,
        id: ValidatedDocumentId,
        mut options: SimilarityOptions,
    ) -> Result<Vec<SimilarEntity>> {
        let Some(vector) = self.store.get_embedding(id).await? else {
            return Ok(Vec::new());
        };
        if !options.exclude_ids.contains(&id) {
            options.exclude_ids.push(id);
        }
        self.search_and_filter(&vector, &options).await
    }

    pub async fn find_similar_by_text(
        &self,
        text: &str,
        options: SimilarityOptions,
    ) -> Result<Vec<SimilarEntity>> {
        let vector = self
            .embeddings
            .embed(text)
            .await
            .map_err(|e| crate::error::EngineError::model(e.to_string()))?;
        self.search_and_filter(&vector, &options).await
    }

    pub async fn find_similar_by_embedding(
        &self,
        vector: &[f32],
        options: SimilarityOptions,
    ) -> Result<Vec<SimilarEntity>> {
        self.search_and_filter(vector, &options).await
    }

    /// Cosine similarity between two stored embeddings; `0.0` if either
    /// entity has no stored embedding.
    pub async fn compute_similarity(
        &self,
        id1: ValidatedDocumentId,
        id2: ValidatedDocumentId,
    ) -> Result<f32> {
        let (Some(a), Some(b)) = (
            self.store.get_embedding(id1).await?,
            self.store.get_embedding(id2).await?,
        ) else {
            return Ok(0.0);
        };
        Ok(cosine_similarity(&a, &b))
    }

    /// Greedy single-pass clustering over `candidates`' embeddings. See
    /// [`cluster_similar_code`] for the algorithm.
    pub fn cluster_similar_code(
        &self,
        candidates: &[(ValidatedDocumentId, Vec<f32>)],
        options: ClusterOptions,
    ) -> Vec<Cluster> {
        cluster_similar_code(candidates, options)
    }
}

/// Greedy single-pass clustering over `candidates`' embeddings: take each
/// unassigned entity as a new centroid, absorb every other unassigned
/// entity whose cosine similarity is at least `options.similarity_threshold`,
/// emit the cluster if it reaches `min_cluster_size`, and stop once
/// `max_clusters` have been emitted.
pub fn cluster_similar_code(
    candidates: &[(ValidatedDocumentId, Vec<f32>)],
    options: ClusterOptions,
) -> Vec<Cluster> {
    let mut assigned = vec![false; candidates.len()];
    let mut clusters = Vec::new();

    for i in 0..candidates.len() {
        if clusters.len() >= options.max_clusters {
            break;
        }
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let (centroid_id, centroid_vec) = &candidates[i];
        let mut members = vec![*centroid_id];

        for j in (i + 1)..candidates.len() {
            if assigned[j] {
                continue;
            }
            let (other_id, other_vec) = &candidates[j];
            let similarity = cosine_similarity(centroid_vec, other_vec);
            if similarity >= options.similarity_threshold {
                assigned[j] = true;
                members.push(*other_id);
            }
        }

        if members.len() >= options.min_cluster_size {
            clusters.push(Cluster {
                centroid: *centroid_id,
                members,
            });
        }
    }

    clusters
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_norm_vector_has_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn clustering_groups_near_identical_vectors() {
        let candidates = vec![
            (ValidatedDocumentId::new(), vec![1.0, 0.0]),
            (ValidatedDocumentId::new(), vec![0.99, 0.01]),
            (ValidatedDocumentId::new(), vec![0.0, 1.0]),
        ];
        let clusters = cluster_similar_code(
            &candidates,
            ClusterOptions {
                similarity_threshold: 0.9,
                min_cluster_size: 2,
                max_clusters: 10,
            },
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[test]
    fn clustering_respects_max_clusters() {
        let candidates: Vec<(ValidatedDocumentId, Vec<f32>)> = (0..5)
            .map(|i| (ValidatedDocumentId::new(), vec![i as f32, 0.0]))
            .collect();
        let clusters = cluster_similar_code(
            &candidates,
            ClusterOptions {
                similarity_threshold: 1.1, // nothing merges
                min_cluster_size: 1,
                max_clusters: 2,
            },
        );
        assert!(clusters.len() <= 2);
    }
}
