//! Per-entity-kind bloom filter. No false negatives by construction; false
//! positives bounded by the configured target rate. Hand-rolled atop
//! `xxhash-rust`, the hashing crate the rest of the codebase already
//! depends on, rather than adding a dedicated bloom-filter crate.

use crate::model::EntityKind;
use crate::types::ValidatedDocumentId;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64_with_seed;

#[derive(Debug, Clone)]
struct BitSet {
    bits: Vec<u64>,
    len_bits: usize,
}

impl BitSet {
    fn new(len_bits: usize) -> Self {
        let words = len_bits.div_ceil(64);
        Self {
            bits: vec![0; words],
            len_bits,
        }
    }

    fn set(&mut self, idx: usize) {
        let idx = idx % self.len_bits;
        self.bits[idx / 64] |= 1 << (idx % 64);
    }

    fn get(&self, idx: usize) -> bool {
        let idx = idx % self.len_bits;
        self.bits[idx / 64] & (1 << (idx % 64)) != 0
    }
}

/// Standard bloom-filter sizing formula from a target false-positive rate
/// and expected item count.
fn optimal_params(expected_items: usize, target_fp_rate: f64) -> (usize, usize) {
    let n = expected_items.max(1) as f64;
    let p = target_fp_rate.clamp(1e-6, 0.5);
    let m = (-(n * p.ln()) / (std::f64::consts::LN_2.powi(2))).ceil().max(8.0);
    let k = ((m / n) * std::f64::consts::LN_2).round().max(1.0);
    (m as usize, k as usize)
}

struct SingleFilter {
    bits: BitSet,
    num_hashes: usize,
}

impl SingleFilter {
    fn new(expected_items: usize, target_fp_rate: f64) -> Self {
        let (bits_count, num_hashes) = optimal_params(expected_items, target_fp_rate);
        Self {
            bits: BitSet::new(bits_count),
            num_hashes,
        }
    }

    fn add(&mut self, key: &[u8]) {
        for i in 0..self.num_hashes {
            let h = xxh3_64_with_seed(key, i as u64) as usize;
            self.bits.set(h);
        }
    }

    fn might_contain(&self, key: &[u8]) -> bool {
        (0..self.num_hashes).all(|i| {
            let h = xxh3_64_with_seed(key, i as u64) as usize;
            self.bits.get(h)
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BloomConfig {
    pub expected_items_per_kind: usize,
    pub target_fp_rate: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            expected_items_per_kind: 10_000,
            target_fp_rate: 0.01,
        }
    }
}

/// One bloom filter per entity kind, so `filter_possible` can discard an
/// entire kind cheaply before testing membership.
pub struct EntityFilter {
    config: BloomConfig,
    filters: HashMap<EntityKind, SingleFilter>,
}

impl EntityFilter {
    pub fn new(config: BloomConfig) -> Self {
        Self {
            config,
            filters: HashMap::new(),
        }
    }

    fn filter_for(&mut self, kind: EntityKind) -> &mut SingleFilter {
        self.filters
            .entry(kind)
            .or_insert_with(|| SingleFilter::new(self.config.expected_items_per_kind, self.config.target_fp_rate))
    }

    pub fn add(&mut self, id: ValidatedDocumentId, kind: EntityKind) {
        let key = id.as_uuid();
        self.filter_for(kind).add(key.as_bytes());
    }

    /// `true` means "possibly present"; `false` is definitive: the id was
    /// never added for this kind.
    pub fn might_exist(&self, id: ValidatedDocumentId, kind: EntityKind) -> bool {
        match self.filters.get(&kind) {
            Some(filter) => filter.might_contain(id.as_uuid().as_bytes()),
            None => false,
        }
    }

    /// Filters a candidate ID list down to those that might exist for
    /// `kind`, discarding only definite non-members.
    pub fn filter_possible(
        &self,
        ids: &[ValidatedDocumentId],
        kind: EntityKind,
    ) -> Vec<ValidatedDocumentId> {
        ids.iter().filter(|id| self.might_exist(**id, kind)).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut filter = EntityFilter::new(BloomConfig::default());
        let ids: Vec<ValidatedDocumentId> = (0..200).map(|_| ValidatedDocumentId::new()).collect();
        for id in &ids {
            filter.add(*id, EntityKind::Function);
        }
        for id in &ids {
            assert!(filter.might_exist(*id, EntityKind::Function));
        }
    }

    #[test]
    fn unseen_kind_is_definitively_absent() {
        let filter = EntityFilter::new(BloomConfig::default());
        let id = ValidatedDocumentId::new();
        assert!(!filter.might_exist(id, EntityKind::Class));
    }

    #[test]
    fn optimal_params_scale_with_expected_items() {
        let (m_small, _) = optimal_params(100, 0.01);
        let (m_large, _) = optimal_params(10_000, 0.01);
        assert!(m_large > m_small);
    }
}
