//! Model router + feedback loop (C11): routes completion/embedding
//! requests across registered model providers by a scored policy, and
//! tracks per-model rolling outcome statistics to adjust future scoring.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Chat,
    Embed,
    CodeCompletion,
    LongContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Complete,
    Embed,
    Stream,
}

/// Static advertisement of one model's capabilities and economics.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub id: String,
    pub vendor: String,
    pub capabilities: Vec<Capability>,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub cost_per_1k_in: f64,
    pub cost_per_1k_out: f64,
    pub typical_latency_ms: u32,
    pub p95_latency_ms: u32,
    pub quality_score: f32,
    pub supported_tasks: Vec<Task>,
    pub is_local: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub model_id: String,
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub latency_ms: u64,
    pub fallback: bool,
}

/// One piece of a streamed completion. `done` marks the final chunk.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub model_id: String,
    pub delta: String,
    pub done: bool,
}

/// A registered backend capable of serving completions/embeddings for its
/// advertised [`ModelConfig`]s.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn configs(&self) -> Vec<ModelConfig>;
    async fn complete(&self, model_id: &str, request: &CompletionRequest) -> Result<CompletionResponse>;
    async fn embed(&self, model_id: &str, text: &str) -> Result<Vec<f32>>;

    /// Streams a completion as a sequence of [`StreamChunk`]s. The default
    /// implementation adapts [`Self::complete`] into a single-chunk stream;
    /// providers capable of incremental generation should override this.
    async fn complete_stream(
        &self,
        model_id: &str,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk>>> {
        let response = self.complete(model_id, request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                model_id: response.model_id,
                delta: response.text,
                done: true,
            }))
            .await;
        Ok(rx)
    }
}

/// Optional, all-fields-default routing constraints.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    pub prefer_local: bool,
    pub max_latency_ms: Option<u32>,
    pub max_cost_per_request: Option<f64>,
    pub required_capabilities: Vec<Capability>,
    pub preferred_vendors: Vec<String>,
    pub fallback_order: Vec<String>,
    pub quality_threshold: Option<f32>,
}

/// Outcome of one execution attempt, posted to the [`FeedbackLoop`]
/// regardless of success.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub model_id: String,
    pub success: bool,
    pub latency: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub fallback: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    Boost,
    Penalty,
    Disable,
}

#[derive(Debug, Clone)]
struct RoutingAdjustment {
    kind: AdjustmentKind,
    /// Additive score delta for `Boost`/`Penalty`; ignored for `Disable`.
    magnitude: f32,
    confidence: f32,
    expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
struct Sample {
    success: bool,
    latency: Duration,
    cost: f64,
    fallback: bool,
}

#[derive(Debug, Clone)]
struct ModelStats {
    window: Vec<Sample>,
    window_size: usize,
}

impl ModelStats {
    fn new(window_size: usize) -> Self {
        Self {
            window: Vec::new(),
            window_size,
        }
    }

    fn record(&mut self, sample: Sample) {
        self.window.push(sample);
        if self.window.len() > self.window_size {
            self.window.remove(0);
        }
    }

    fn success_rate(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        let successes = self.window.iter().filter(|s| s.success).count();
        Some(successes as f32 / self.window.len() as f32)
    }

    fn fallback_rate(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        let fallbacks = self.window.iter().filter(|s| s.fallback).count();
        Some(fallbacks as f32 / self.window.len() as f32)
    }

    fn avg_cost(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().map(|s| s.cost).sum::<f64>() / self.window.len() as f64)
    }

    fn latency_percentile(&self, p: f64) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = self.window.iter().map(|s| s.latency).collect();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ModelStatsSnapshot {
    pub model_id: String,
    pub sample_count: usize,
    pub success_rate: Option<f32>,
    pub p50_latency: Option<Duration>,
    pub p90_latency: Option<Duration>,
    pub p99_latency: Option<Duration>,
    pub avg_cost: Option<f64>,
    pub fallback_rate: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackLoopConfig {
    pub window_size: usize,
    pub min_samples: usize,
    pub decay_rate: f32,
    pub adjustment_ttl: Duration,
}

impl Default for FeedbackLoopConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            min_samples: 5,
            decay_rate: 0.1,
            adjustment_ttl: Duration::from_secs(300),
        }
    }
}

/// Per-model rolling statistics and the boost/penalty/disable adjustments
/// derived from them.
pub struct FeedbackLoop {
    config: FeedbackLoopConfig,
    stats: RwLock<HashMap<String, ModelStats>>,
    adjustments: RwLock<HashMap<String, RoutingAdjustment>>,
}

impl FeedbackLoop {
    pub fn new(config: FeedbackLoopConfig) -> Self {
        Self {
            config,
            stats: RwLock::new(HashMap::new()),
            adjustments: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record(&self, outcome: &ModelOutcome) {
        let mut stats = self.stats.write().await;
        let entry = stats
            .entry(outcome.model_id.clone())
            .or_insert_with(|| ModelStats::new(self.config.window_size));
        entry.record(Sample {
            success: outcome.success,
            latency: outcome.latency,
            cost: outcome.cost,
            fallback: outcome.fallback,
        });
        if entry.window.len() < self.config.min_samples {
            return;
        }
        drop(stats);
        self.recalculate(&outcome.model_id).await;
    }

    async fn recalculate(&self, model_id: &str) {
        let stats = self.stats.read().await;
        let Some(entry) = stats.get(model_id) else {
            return;
        };
        let Some(success_rate) = entry.success_rate() else {
            return;
        };
        let fallback_rate = entry.fallback_rate().unwrap_or(0.0);
        drop(stats);

        let mut adjustments = self.adjustments.write().await;
        let now_plus_ttl = Instant::now() + self.config.adjustment_ttl;
        if success_rate < 0.5 {
            adjustments.insert(
                model_id.to_string(),
                RoutingAdjustment {
                    kind: AdjustmentKind::Disable,
                    magnitude: 0.0,
                    confidence: 1.0 - success_rate,
                    expires_at: now_plus_ttl,
                },
            );
        } else if fallback_rate > 0.3 || success_rate < 0.8 {
            adjustments.insert(
                model_id.to_string(),
                RoutingAdjustment {
                    kind: AdjustmentKind::Penalty,
                    magnitude: 15.0,
                    confidence: fallback_rate.max(1.0 - success_rate),
                    expires_at: now_plus_ttl,
                },
            );
        } else if success_rate > 0.98 {
            adjustments.insert(
                model_id.to_string(),
                RoutingAdjustment {
                    kind: AdjustmentKind::Boost,
                    magnitude: 10.0,
                    confidence: success_rate,
                    expires_at: now_plus_ttl,
                },
            );
        } else {
            adjustments.remove(model_id);
        }
    }

    /// Whether routing must exclude `model_id` right now.
    pub async fn is_disabled(&self, model_id: &str) -> bool {
        let adjustments = self.adjustments.read().await;
        matches!(
            adjustments.get(model_id),
            Some(a) if a.kind == AdjustmentKind::Disable && a.expires_at > Instant::now()
        )
    }

    /// Applies any live boost/penalty adjustment to `base`, decaying its
    /// magnitude linearly as it approaches expiry.
    pub async fn get_adjusted_score(&self, model_id: &str, base: f32) -> f32 {
        let adjustments = self.adjustments.read().await;
        let Some(adj) = adjustments.get(model_id) else {
            return base;
        };
        if adj.expires_at <= Instant::now() {
            return base;
        }
        let remaining = adj
            .expires_at
            .saturating_duration_since(Instant::now())
            .as_secs_f32();
        let ttl = self.config.adjustment_ttl.as_secs_f32().max(1.0);
        let decay = (remaining / ttl).clamp(0.0, 1.0) * (1.0 - self.config.decay_rate).max(0.0);
        match adj.kind {
            AdjustmentKind::Boost => base + adj.magnitude * decay,
            AdjustmentKind::Penalty => base - adj.magnitude * decay,
            AdjustmentKind::Disable => base,
        }
    }

    pub async fn snapshot(&self, model_id: &str) -> Option<ModelStatsSnapshot> {
        let stats = self.stats.read().await;
        let entry = stats.get(model_id)?;
        Some(ModelStatsSnapshot {
            model_id: model_id.to_string(),
            sample_count: entry.window.len(),
            success_rate: entry.success_rate(),
            p50_latency: entry.latency_percentile(0.50),
            p90_latency: entry.latency_percentile(0.90),
            p99_latency: entry.latency_percentile(0.99),
            avg_cost: entry.avg_cost(),
            fallback_rate: entry.fallback_rate(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub primary: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RouterStats {
    pub total_requests: u64,
    pub fallback_count: u64,
}

/// Registers [`ModelProvider`]s and routes requests across their advertised
/// [`ModelConfig`]s by a weighted scoring formula, recording every
/// attempt's outcome into a [`FeedbackLoop`].
pub struct ModelRouter {
    providers: RwLock<Vec<Arc<dyn ModelProvider>>>,
    feedback: Arc<FeedbackLoop>,
    stats: RwLock<RouterStats>,
}

impl ModelRouter {
    pub fn new(feedback: Arc<FeedbackLoop>) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            feedback,
            stats: RwLock::new(RouterStats::default()),
        }
    }

    pub async fn register_provider(&self, provider: Arc<dyn ModelProvider>) {
        self.providers.write().await.push(provider);
    }

    async fn all_configs(&self) -> Vec<(ModelConfig, Arc<dyn ModelProvider>)> {
        let providers = self.providers.read().await;
        providers
            .iter()
            .flat_map(|p| p.configs().into_iter().map(move |c| (c, p.clone())))
            .collect()
    }

    fn satisfies_policy(config: &ModelConfig, task: Task, policy: &RoutingPolicy) -> bool {
        if !config.supported_tasks.contains(&task) {
            return false;
        }
        if !policy
            .required_capabilities
            .iter()
            .all(|cap| config.capabilities.contains(cap))
        {
            return false;
        }
        if let Some(max_latency) = policy.max_latency_ms {
            if config.typical_latency_ms > max_latency {
                return false;
            }
        }
        if let Some(threshold) = policy.quality_threshold {
            if config.quality_score < threshold {
                return false;
            }
        }
        if let Some(max_cost) = policy.max_cost_per_request {
            let estimated_cost =
                (config.max_output_tokens as f64 / 1000.0) * config.cost_per_1k_out;
            if estimated_cost > max_cost {
                return false;
            }
        }
        true
    }

    async fn score(&self, config: &ModelConfig, policy: &RoutingPolicy) -> f32 {
        let mut score = config.quality_score * 100.0;
        if policy.prefer_local && config.is_local {
            score += 30.0;
        }
        // latency factor: faster than 200ms earns the full +20, scaling
        // down to 0 at 2000ms and beyond.
        let latency_factor = (1.0 - (config.typical_latency_ms as f32 / 2000.0)).clamp(0.0, 1.0);
        score += latency_factor * 20.0;
        // cost factor: cheaper than $0.01/1k tokens earns the full +15.
        let avg_cost = (config.cost_per_1k_in + config.cost_per_1k_out) / 2.0;
        let cost_factor = (1.0 - (avg_cost as f32 / 0.01)).clamp(0.0, 1.0);
        score += cost_factor * 15.0;
        // context-window factor: saturates at 128k tokens.
        let context_factor = (config.context_window as f32 / 128_000.0).clamp(0.0, 1.0);
        score += context_factor * 10.0;
        if let Some(rank) = policy.preferred_vendors.iter().position(|v| v == &config.vendor) {
            score += (policy.preferred_vendors.len() - rank) as f32;
        }
        self.feedback.get_adjusted_score(&config.id, score).await
    }

    /// Ranks every candidate model for `task` under `policy`, highest
    /// score first, ties broken by lower cost then lower latency.
    async fn ranked_candidates(
        &self,
        task: Task,
        policy: &RoutingPolicy,
    ) -> Vec<(ModelConfig, Arc<dyn ModelProvider>, f32)> {
        let mut candidates = Vec::new();
        for (config, provider) in self.all_configs().await {
            if self.feedback.is_disabled(&config.id).await {
                continue;
            }
            if !Self::satisfies_policy(&config, task, policy) {
                continue;
            }
            let score = self.score(&config, policy).await;
            candidates.push((config, provider, score));
        }
        candidates.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let cost_a = a.0.cost_per_1k_in + a.0.cost_per_1k_out;
                    let cost_b = b.0.cost_per_1k_in + b.0.cost_per_1k_out;
                    cost_a
                        .partial_cmp(&cost_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.0.typical_latency_ms.cmp(&b.0.typical_latency_ms))
        });
        if !policy.fallback_order.is_empty() {
            let mut ordered = Vec::new();
            for id in &policy.fallback_order {
                if let Some(pos) = candidates.iter().position(|c| &c.0.id == id) {
                    ordered.push(candidates.remove(pos));
                }
            }
            ordered.extend(candidates);
            return ordered;
        }
        candidates
    }

    pub async fn route(&self, task: Task, policy: &RoutingPolicy) -> Result<RoutingDecision> {
        let candidates = self.ranked_candidates(task, policy).await;
        let Some((primary, ..)) = candidates.first() else {
            return Err(EngineError::model("no model satisfies routing policy"));
        };
        Ok(RoutingDecision {
            primary: primary.id.clone(),
            alternatives: candidates.iter().skip(1).map(|c| c.0.id.clone()).collect(),
        })
    }

    /// Routes, then executes against the primary, falling back to
    /// alternatives in score order on failure. Every attempt (success or
    /// failure) is posted to the feedback loop.
    pub async fn execute(
        &self,
        request: &CompletionRequest,
        policy: &RoutingPolicy,
    ) -> Result<CompletionResponse> {
        let candidates = self.ranked_candidates(Task::Complete, policy).await;
        if candidates.is_empty() {
            return Err(EngineError::model("no model satisfies routing policy"));
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_requests += 1;
        }

        let mut last_err = None;
        for (idx, (config, provider, _score)) in candidates.iter().enumerate() {
            let is_fallback = idx > 0;
            let started = Instant::now();
            match provider.complete(&config.id, request).await {
                Ok(mut response) => {
                    let latency = started.elapsed();
                    response.latency_ms = latency.as_millis() as u64;
                    response.fallback = is_fallback;
                    self.feedback
                        .record(&ModelOutcome {
                            model_id: config.id.clone(),
                            success: true,
                            latency,
                            input_tokens: response.input_tokens,
                            output_tokens: response.output_tokens,
                            cost: response.cost,
                            fallback: is_fallback,
                            error: None,
                        })
                        .await;
                    if is_fallback {
                        self.stats.write().await.fallback_count += 1;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let latency = started.elapsed();
                    self.feedback
                        .record(&ModelOutcome {
                            model_id: config.id.clone(),
                            success: false,
                            latency,
                            input_tokens: 0,
                            output_tokens: 0,
                            cost: 0.0,
                            fallback: is_fallback,
                            error: Some(err.to_string()),
                        })
                        .await;
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| EngineError::model("all candidate models failed")))
    }

    /// Routes and streams like [`Self::execute`], but returns a channel of
    /// [`StreamChunk`]s instead of a single response. `policy.max_latency_ms`
    /// bounds how long a candidate is given to open its stream before the
    /// attempt is abandoned and the next candidate is tried.
    pub async fn execute_stream(
        &self,
        request: &CompletionRequest,
        policy: &RoutingPolicy,
    ) -> Result<mpsc::Receiver<Result<StreamChunk>>> {
        let candidates = self.ranked_candidates(Task::Stream, policy).await;
        if candidates.is_empty() {
            return Err(EngineError::model("no model satisfies routing policy"));
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_requests += 1;
        }

        let mut last_err = None;
        for (idx, (config, provider, _score)) in candidates.iter().enumerate() {
            let is_fallback = idx > 0;
            let started = Instant::now();
            let attempt = provider.complete_stream(&config.id, request);
            let outcome = match policy.max_latency_ms {
                Some(max_latency) => {
                    match tokio::time::timeout(Duration::from_millis(max_latency as u64), attempt)
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(EngineError::Timeout {
                            message: format!("{} did not open a stream in time", config.id),
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        }),
                    }
                }
                None => attempt.await,
            };

            match outcome {
                Ok(rx) => {
                    let latency = started.elapsed();
                    self.feedback
                        .record(&ModelOutcome {
                            model_id: config.id.clone(),
                            success: true,
                            latency,
                            input_tokens: 0,
                            output_tokens: 0,
                            cost: 0.0,
                            fallback: is_fallback,
                            error: None,
                        })
                        .await;
                    if is_fallback {
                        self.stats.write().await.fallback_count += 1;
                    }
                    return Ok(rx);
                }
                Err(err) => {
                    let latency = started.elapsed();
                    self.feedback
                        .record(&ModelOutcome {
                            model_id: config.id.clone(),
                            success: false,
                            latency,
                            input_tokens: 0,
                            output_tokens: 0,
                            cost: 0.0,
                            fallback: is_fallback,
                            error: Some(err.to_string()),
                        })
                        .await;
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| EngineError::model("all candidate models failed")))
    }

    pub async fn embed(&self, text: &str, policy: &RoutingPolicy) -> Result<Vec<f32>> {
        let candidates = self.ranked_candidates(Task::Embed, policy).await;
        let (config, provider, _) = candidates
            .first()
            .ok_or_else(|| EngineError::model("no embedding model satisfies routing policy"))?;
        provider.embed(&config.id, text).await
    }

    pub async fn stats(&self) -> RouterStats {
        self.stats.read().await.clone()
    }

    pub async fn shutdown(&self) {
        self.providers.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubProvider {
        config: ModelConfig,
        fail_first_call: Arc<AtomicBool>,
    }

    fn stub_config(id: &str, quality: f32, local: bool) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            vendor: "acme".to_string(),
            capabilities: vec![Capability::Chat, Capability::CodeCompletion],
            context_window: 32_000,
            max_output_tokens: 4096,
            cost_per_1k_in: 0.002,
            cost_per_1k_out: 0.004,
            typical_latency_ms: 200,
            p95_latency_ms: 400,
            quality_score: quality,
            supported_tasks: vec![Task::Complete, Task::Embed, Task::Stream],
            is_local: local,
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn configs(&self) -> Vec<ModelConfig> {
            vec![self.config.clone()]
        }

        async fn complete(&self, model_id: &str, _request: &CompletionRequest) -> Result<CompletionResponse> {
            if model_id == self.config.id && self.fail_first_call.swap(false, Ordering::SeqCst) {
                return Err(EngineError::model("simulated provider failure"));
            }
            Ok(CompletionResponse {
                model_id: model_id.to_string(),
                text: "ok".to_string(),
                input_tokens: 10,
                output_tokens: 5,
                cost: 0.001,
                latency_ms: 0,
                fallback: false,
            })
        }

        async fn embed(&self, _model_id: &str, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    fn router_with(providers: Vec<Arc<dyn ModelProvider>>) -> ModelRouter {
        let mut router = ModelRouter::new(Arc::new(FeedbackLoop::new(FeedbackLoopConfig::default())));
        router.providers = RwLock::new(providers);
        router
    }

    #[tokio::test]
    async fn higher_quality_model_is_routed_first() {
        let p1 = Arc::new(StubProvider {
            config: stub_config("m1", 0.7, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let p2 = Arc::new(StubProvider {
            config: stub_config("m2", 0.95, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let router = router_with(vec![p1, p2]);
        let decision = router.route(Task::Complete, &RoutingPolicy::default()).await.unwrap();
        assert_eq!(decision.primary, "m2");
    }

    #[tokio::test]
    async fn failed_primary_falls_back_and_records_both_outcomes() {
        let fail_flag = Arc::new(AtomicBool::new(true));
        let p1 = Arc::new(StubProvider {
            config: stub_config("m1", 0.95, false),
            fail_first_call: fail_flag,
        });
        let p2 = Arc::new(StubProvider {
            config: stub_config("m2", 0.7, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let router = router_with(vec![p1, p2]);
        let response = router
            .execute(&CompletionRequest { prompt: "hi".to_string(), max_tokens: None }, &RoutingPolicy::default())
            .await
            .unwrap();
        assert_eq!(response.model_id, "m2");
        assert!(response.fallback);
        assert_eq!(router.stats().await.fallback_count, 1);
    }

    #[tokio::test]
    async fn prefer_local_adds_bonus_to_local_candidate() {
        let p1 = Arc::new(StubProvider {
            config: stub_config("remote", 0.8, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let p2 = Arc::new(StubProvider {
            config: stub_config("local", 0.78, true),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let router = router_with(vec![p1, p2]);
        let policy = RoutingPolicy {
            prefer_local: true,
            ..Default::default()
        };
        let decision = router.route(Task::Complete, &policy).await.unwrap();
        assert_eq!(decision.primary, "local");
    }

    #[tokio::test]
    async fn low_success_rate_triggers_disable() {
        let feedback = Arc::new(FeedbackLoop::new(FeedbackLoopConfig {
            window_size: 10,
            min_samples: 3,
            decay_rate: 0.1,
            adjustment_ttl: Duration::from_secs(300),
        }));
        for _ in 0..5 {
            feedback
                .record(&ModelOutcome {
                    model_id: "flaky".to_string(),
                    success: false,
                    latency: Duration::from_millis(50),
                    input_tokens: 0,
                    output_tokens: 0,
                    cost: 0.0,
                    fallback: false,
                    error: Some("boom".to_string()),
                })
                .await;
        }
        assert!(feedback.is_disabled("flaky").await);
    }

    #[tokio::test]
    async fn execute_stream_yields_chunks_from_default_adapter() {
        let p1 = Arc::new(StubProvider {
            config: stub_config("m1", 0.9, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let router = router_with(vec![p1]);
        let mut rx = router
            .execute_stream(
                &CompletionRequest { prompt: "hi".to_string(), max_tokens: None },
                &RoutingPolicy::default(),
            )
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.model_id, "m1");
        assert!(chunk.done);
    }

    #[tokio::test]
    async fn max_cost_per_request_excludes_expensive_candidates() {
        let p1 = Arc::new(StubProvider {
            config: stub_config("cheap", 0.8, false),
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let mut expensive_config = stub_config("expensive", 0.95, false);
        expensive_config.cost_per_1k_out = 1.0;
        let p2 = Arc::new(StubProvider {
            config: expensive_config,
            fail_first_call: Arc::new(AtomicBool::new(false)),
        });
        let router = router_with(vec![p1, p2]);
        let policy = RoutingPolicy {
            max_cost_per_request: Some(0.02),
            ..Default::default()
        };
        let decision = router.route(Task::Complete, &policy).await.unwrap();
        assert_eq!(decision.primary, "cheap");
    }
}
