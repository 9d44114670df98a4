//! Per-operation latency tracking over a ring buffer: percentiles, slow-op
//! flagging, bottleneck surfacing, and trend classification from bucketed
//! averages.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfTrend {
    Improving,
    Stable,
    Degrading,
}

/// Handle returned by `start`; pass to `end` to record the elapsed time.
pub struct Token {
    op: String,
    subsystem: String,
    started_at: Instant,
}

struct Series {
    /// Most recent durations, bounded to `ring_capacity`.
    samples: Vec<Duration>,
    ring_capacity: usize,
}

impl Series {
    fn push(&mut self, d: Duration) {
        if self.samples.len() >= self.ring_capacity {
            self.samples.remove(0);
        }
        self.samples.push(d);
    }

    fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        Some(sorted[idx])
    }

    fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerfTrackerConfig {
    pub ring_capacity: usize,
    pub slow_op_threshold: Duration,
    /// Bottleneck if mean * count over the recent window exceeds this.
    pub bottleneck_cost_threshold: f64,
}

impl Default for PerfTrackerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 256,
            slow_op_threshold: Duration::from_millis(500),
            bottleneck_cost_threshold: 5_000.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Percentiles {
    pub p50: Option<Duration>,
    pub p95: Option<Duration>,
    pub p99: Option<Duration>,
}

pub struct PerfTracker {
    config: PerfTrackerConfig,
    series: Mutex<HashMap<(String, String), Series>>,
}

impl PerfTracker {
    pub fn new(config: PerfTrackerConfig) -> Self {
        Self {
            config,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn start(&self, op: &str, subsystem: &str) -> Token {
        Token {
            op: op.to_string(),
            subsystem: subsystem.to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn end(&self, token: Token) {
        let elapsed = token.started_at.elapsed();
        self.record(&token.op, &token.subsystem, elapsed);
    }

    pub fn record(&self, op: &str, subsystem: &str, elapsed: Duration) {
        let mut series = self.series.lock();
        let entry = series
            .entry((op.to_string(), subsystem.to_string()))
            .or_insert_with(|| Series {
                samples: Vec::new(),
                ring_capacity: self.config.ring_capacity,
            });
        entry.push(elapsed);
    }

    pub fn percentiles(&self, op: &str, subsystem: &str) -> Percentiles {
        let series = self.series.lock();
        match series.get(&(op.to_string(), subsystem.to_string())) {
            Some(s) => Percentiles {
                p50: s.percentile(0.50),
                p95: s.percentile(0.95),
                p99: s.percentile(0.99),
            },
            None => Percentiles::default(),
        }
    }

    pub fn is_slow(&self, op: &str, subsystem: &str) -> bool {
        self.percentiles(op, subsystem)
            .p95
            .map(|p95| p95 >= self.config.slow_op_threshold)
            .unwrap_or(false)
    }

    /// Operations whose `mean * count` over the recent window exceeds the
    /// configured cost threshold, sorted descending by cost.
    pub fn bottlenecks(&self) -> Vec<(String, String, f64)> {
        let series = self.series.lock();
        let mut costs: Vec<(String, String, f64)> = series
            .iter()
            .filter_map(|((op, subsystem), s)| {
                let mean = s.mean()?;
                let cost = mean.as_secs_f64() * 1000.0 * s.samples.len() as f64;
                (cost >= self.config.bottleneck_cost_threshold)
                    .then_some((op.clone(), subsystem.clone(), cost))
            })
            .collect();
        costs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());
        costs
    }

    /// Compares the mean of the first half of the ring against the second
    /// half; lower-is-better (latency), so a falling mean is `Improving`.
    pub fn trend(&self, op: &str, subsystem: &str) -> PerfTrend {
        let series = self.series.lock();
        let Some(s) = series.get(&(op.to_string(), subsystem.to_string())) else {
            return PerfTrend::Stable;
        };
        if s.samples.len() < 4 {
            return PerfTrend::Stable;
        }
        let half = s.samples.len() / 2;
        let first: Duration = s.samples[..half].iter().sum::<Duration>() / half as u32;
        let second: Duration = s.samples[half..].iter().sum::<Duration>() / (s.samples.len() - half) as u32;
        if second < first {
            PerfTrend::Improving
        } else if second > first {
            PerfTrend::Degrading
        } else {
            PerfTrend::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_reflect_recorded_samples() {
        let tracker = PerfTracker::new(PerfTrackerConfig::default());
        for ms in [10, 20, 30, 40, 50] {
            tracker.record("query", "store", Duration::from_millis(ms));
        }
        let p = tracker.percentiles("query", "store");
        assert_eq!(p.p50, Some(Duration::from_millis(30)));
    }

    #[test]
    fn slow_op_flagged_above_threshold() {
        let tracker = PerfTracker::new(PerfTrackerConfig {
            slow_op_threshold: Duration::from_millis(100),
            ..PerfTrackerConfig::default()
        });
        tracker.record("index_file", "indexer", Duration::from_millis(500));
        assert!(tracker.is_slow("index_file", "indexer"));
    }

    #[test]
    fn degrading_trend_when_recent_half_slower() {
        let tracker = PerfTracker::new(PerfTrackerConfig::default());
        for ms in [10, 10, 100, 100] {
            tracker.record("query", "store", Duration::from_millis(ms));
        }
        assert_eq!(tracker.trend("query", "store"), PerfTrend::Degrading);
    }
}
