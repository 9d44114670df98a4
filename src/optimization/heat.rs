//! Time-decayed access scoring per entity. Every access bumps a score;
//! scores decay by a fixed factor every `decay_interval`. Classifies
//! entities into hot/cold and reports an access trend from a small
//! ring-buffer of recent bucket counts.

use crate::model::{EntityKind, HeatEntry};
use crate::types::ValidatedDocumentId;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperature {
    Hot,
    Cold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy)]
pub struct HeatConfig {
    pub decay_interval: Duration,
    pub decay_factor: f64,
    pub hot_threshold: f64,
    pub cold_threshold: f64,
    /// Number of recent access buckets retained per entity for trend
    /// classification.
    pub trend_window: usize,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            decay_interval: Duration::from_secs(60),
            decay_factor: 0.5,
            hot_threshold: 10.0,
            cold_threshold: 1.0,
            trend_window: 5,
        }
    }
}

struct Tracked {
    kind: EntityKind,
    score: f64,
    access_count: u64,
    last_accessed: Instant,
    last_decay: Instant,
    recent_buckets: Vec<u64>,
}

pub struct HeatTracker {
    config: HeatConfig,
    entries: HashMap<ValidatedDocumentId, Tracked>,
}

impl HeatTracker {
    pub fn new(config: HeatConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    fn decay_if_due(&self, tracked: &mut Tracked) {
        let elapsed = tracked.last_decay.elapsed();
        if elapsed >= self.config.decay_interval {
            let periods = (elapsed.as_secs_f64() / self.config.decay_interval.as_secs_f64()).floor();
            tracked.score *= self.config.decay_factor.powf(periods);
            tracked.last_decay = Instant::now();
        }
    }

    /// Record one access to `id`, bumping its score and access count.
    pub fn record_access(&mut self, id: ValidatedDocumentId, kind: EntityKind) {
        let window = self.config.trend_window;
        let tracked = self.entries.entry(id).or_insert_with(|| Tracked {
            kind,
            score: 0.0,
            access_count: 0,
            last_accessed: Instant::now(),
            last_decay: Instant::now(),
            recent_buckets: vec![0; window],
        });
        self.decay_if_due(tracked);
        tracked.score += 1.0;
        tracked.access_count += 1;
        tracked.last_accessed = Instant::now();
        if let Some(last) = tracked.recent_buckets.last_mut() {
            *last += 1;
        }
    }

    /// Advance the trend ring buffer by one bucket; callers invoke this on
    /// a fixed tick (e.g. every `decay_interval`).
    pub fn tick_bucket(&mut self, id: ValidatedDocumentId) {
        if let Some(tracked) = self.entries.get_mut(&id) {
            tracked.recent_buckets.remove(0);
            tracked.recent_buckets.push(0);
        }
    }

    pub fn temperature(&self, id: ValidatedDocumentId) -> Option<Temperature> {
        let tracked = self.entries.get(&id)?;
        Some(if tracked.score >= self.config.hot_threshold {
            Temperature::Hot
        } else {
            Temperature::Cold
        })
    }

    /// Classifies the recent-bucket gradient as rising, falling, or stable.
    pub fn trend(&self, id: ValidatedDocumentId) -> Option<Trend> {
        let tracked = self.entries.get(&id)?;
        let buckets = &tracked.recent_buckets;
        if buckets.len() < 2 {
            return Some(Trend::Stable);
        }
        let half = buckets.len() / 2;
        let first_half: u64 = buckets[..half].iter().sum();
        let second_half: u64 = buckets[half..].iter().sum();
        Some(if second_half > first_half {
            Trend::Rising
        } else if second_half < first_half {
            Trend::Falling
        } else {
            Trend::Stable
        })
    }

    pub fn snapshot(&self, id: ValidatedDocumentId) -> Option<HeatEntry> {
        let tracked = self.entries.get(&id)?;
        Some(HeatEntry {
            entity_id: id,
            kind: tracked.kind,
            score: tracked.score,
            last_accessed_at: Utc::now(),
            access_count: tracked.access_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_access_raises_score_above_hot_threshold() {
        let mut tracker = HeatTracker::new(HeatConfig {
            hot_threshold: 3.0,
            ..HeatConfig::default()
        });
        let id = ValidatedDocumentId::new();
        for _ in 0..5 {
            tracker.record_access(id, EntityKind::Function);
        }
        assert_eq!(tracker.temperature(id), Some(Temperature::Hot));
    }

    #[test]
    fn unaccessed_entity_has_no_temperature() {
        let tracker = HeatTracker::new(HeatConfig::default());
        assert_eq!(tracker.temperature(ValidatedDocumentId::new()), None);
    }

    #[test]
    fn rising_trend_detected_when_second_half_busier() {
        let mut tracker = HeatTracker::new(HeatConfig {
            trend_window: 4,
            ..HeatConfig::default()
        });
        let id = ValidatedDocumentId::new();
        tracker.record_access(id, EntityKind::Function);
        tracker.tick_bucket(id);
        tracker.tick_bucket(id);
        tracker.record_access(id, EntityKind::Function);
        tracker.record_access(id, EntityKind::Function);
        assert_eq!(tracker.trend(id), Some(Trend::Rising));
    }
}
