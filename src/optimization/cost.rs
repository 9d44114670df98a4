//! Per-operation model-usage cost attribution: records input/output tokens
//! and compute time, rolls up by operation, model, and time range.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct CostRecord {
    pub operation: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub compute_time_ms: u64,
    pub cost: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CostSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub compute_time_ms: u64,
    pub cost: f64,
    pub count: u64,
}

impl CostSummary {
    fn absorb(&mut self, record: &CostRecord) {
        self.input_tokens += record.input_tokens;
        self.output_tokens += record.output_tokens;
        self.compute_time_ms += record.compute_time_ms;
        self.cost += record.cost;
        self.count += 1;
    }
}

pub struct CostTracker {
    records: Mutex<Vec<CostRecord>>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostTracker {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, record: CostRecord) {
        self.records.lock().push(record);
    }

    pub fn by_operation(&self, operation: &str) -> CostSummary {
        let mut summary = CostSummary::default();
        for record in self.records.lock().iter().filter(|r| r.operation == operation) {
            summary.absorb(record);
        }
        summary
    }

    pub fn by_model(&self, model_id: &str) -> CostSummary {
        let mut summary = CostSummary::default();
        for record in self.records.lock().iter().filter(|r| r.model_id == model_id) {
            summary.absorb(record);
        }
        summary
    }

    pub fn by_time_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CostSummary {
        let mut summary = CostSummary::default();
        for record in self
            .records
            .lock()
            .iter()
            .filter(|r| r.recorded_at >= from && r.recorded_at <= to)
        {
            summary.absorb(record);
        }
        summary
    }

    pub fn total(&self) -> CostSummary {
        let mut summary = CostSummary::default();
        for record in self.records.lock().iter() {
            summary.absorb(record);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(operation: &str, model_id: &str, cost: f64) -> CostRecord {
        CostRecord {
            operation: operation.to_string(),
            model_id: model_id.to_string(),
            input_tokens: 100,
            output_tokens: 50,
            compute_time_ms: 200,
            cost,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn rollup_by_model_sums_only_matching_records() {
        let tracker = CostTracker::new();
        tracker.record(record("search", "model-a", 0.01));
        tracker.record(record("search", "model-b", 0.02));
        let summary = tracker.by_model("model-a");
        assert_eq!(summary.count, 1);
        assert!((summary.cost - 0.01).abs() < 1e-9);
    }

    #[test]
    fn total_sums_every_record() {
        let tracker = CostTracker::new();
        tracker.record(record("search", "model-a", 0.01));
        tracker.record(record("index", "model-a", 0.02));
        assert_eq!(tracker.total().count, 2);
    }
}
