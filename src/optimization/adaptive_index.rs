//! Consumes heat data to recommend index maintenance actions and maintains
//! a re-index priority queue.

use super::heat::{HeatTracker, Temperature};
use crate::types::ValidatedDocumentId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Create,
    Remove,
    Optimize,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub entity_id: ValidatedDocumentId,
    pub action: IndexAction,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct PriorityItem {
    priority: u32,
    sequence: u64,
    entity_id: ValidatedDocumentId,
}

impl Ord for PriorityItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PriorityItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Re-index priority queue plus a deferral set, driven by [`HeatTracker`]
/// readings.
pub struct AdaptiveIndex {
    queue: BinaryHeap<PriorityItem>,
    deferred: HashSet<ValidatedDocumentId>,
    sequence: u64,
}

impl Default for AdaptiveIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveIndex {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            deferred: HashSet::new(),
            sequence: 0,
        }
    }

    /// Inspects `heat` for `id` and recommends a maintenance action: hot
    /// entities get prioritized for a dedicated index (`Create`), cold
    /// entities with an existing dedicated index are candidates for
    /// `Remove`, everything else is `Optimize`.
    pub fn recommend(&self, heat: &HeatTracker, id: ValidatedDocumentId) -> Option<Recommendation> {
        let temperature = heat.temperature(id)?;
        let (action, reason) = match temperature {
            Temperature::Hot => (IndexAction::Create, "entity is hot"),
            Temperature::Cold => (IndexAction::Remove, "entity is cold"),
        };
        Some(Recommendation {
            entity_id: id,
            action,
            reason,
        })
    }

    pub fn enqueue(&mut self, entity_id: ValidatedDocumentId, priority: u32) {
        self.deferred.remove(&entity_id);
        self.sequence += 1;
        self.queue.push(PriorityItem {
            priority,
            sequence: self.sequence,
            entity_id,
        });
    }

    pub fn pop_next(&mut self) -> Option<ValidatedDocumentId> {
        self.queue.pop().map(|item| item.entity_id)
    }

    pub fn should_prioritize(&self, entity_id: ValidatedDocumentId) -> bool {
        self.queue.iter().any(|item| item.entity_id == entity_id && item.priority >= 100)
    }

    pub fn should_defer(&self, entity_id: ValidatedDocumentId) -> bool {
        self.deferred.contains(&entity_id)
    }

    pub fn defer(&mut self, entity_id: ValidatedDocumentId) {
        self.deferred.insert(entity_id);
    }
}
