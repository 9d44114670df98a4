//! Explicit span/trace contract, layered alongside `observability`'s
//! ambient `tracing`-based logging. Built as an explicit wrapper rather
//! than runtime method-patching.

use crate::model::{SpanData, SpanEvent, SpanStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::info;
use uuid::Uuid;

/// A single in-flight timed unit of work.
pub struct Span {
    data: SpanData,
    started: std::time::Instant,
}

impl Span {
    pub fn trace_id(&self) -> Uuid {
        self.data.trace_id
    }

    pub fn span_id(&self) -> Uuid {
        self.data.span_id
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.attributes.insert(key.into(), value);
    }

    pub fn add_event(&mut self, name: impl Into<String>) {
        self.data.events.push(SpanEvent {
            name: name.into(),
            timestamp: chrono::Utc::now(),
            attributes: HashMap::new(),
        });
    }

    pub fn record_exception(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.data.events.push(SpanEvent {
            name: "exception".to_string(),
            timestamp: chrono::Utc::now(),
            attributes: HashMap::from([("message".to_string(), serde_json::Value::String(message))]),
        });
        self.data.status = SpanStatus::Error;
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        self.data.status = status;
    }

    fn finish(mut self) -> SpanData {
        self.data.end = Some(chrono::Utc::now());
        let _ = self.started.elapsed();
        self.data
    }
}

/// Options for starting a span.
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    pub parent_span_id: Option<Uuid>,
    pub trace_id: Option<Uuid>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Destination for completed spans.
#[async_trait::async_trait]
pub trait TraceExporter: Send + Sync {
    async fn export(&self, spans: &[SpanData]);
    async fn shutdown(&self) {}
}

/// Writes spans as newline-delimited JSON into rotating files under a
/// directory, one file per process start.
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let file_name = format!("trace-{}.jsonl", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
        Self {
            path: directory.join(file_name),
        }
    }
}

#[async_trait::async_trait]
impl TraceExporter for FileExporter {
    async fn export(&self, spans: &[SpanData]) {
        if spans.is_empty() {
            return;
        }
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let mut contents = String::new();
        for span in spans {
            if let Ok(line) = serde_json::to_string(span) {
                contents.push_str(&line);
                contents.push('\n');
            }
        }

        use tokio::io::AsyncWriteExt;
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await;
        match file {
            Ok(mut file) => {
                if let Err(e) = file.write_all(contents.as_bytes()).await {
                    tracing::warn!(error = %e, "failed to write trace export file");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to open trace export file");
            }
        }
    }
}

/// Logs each span through `tracing`.
#[derive(Default)]
pub struct ConsoleExporter;

#[async_trait::async_trait]
impl TraceExporter for ConsoleExporter {
    async fn export(&self, spans: &[SpanData]) {
        for span in spans {
            info!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                name = %span.name,
                status = ?span.status,
                "span completed"
            );
        }
    }
}

/// Buffers spans in memory; used by tests that need to assert on exported
/// spans without touching the filesystem.
#[derive(Default)]
pub struct MemoryExporter {
    exported: Mutex<Vec<SpanData>>,
}

impl MemoryExporter {
    pub async fn exported(&self) -> Vec<SpanData> {
        self.exported.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl TraceExporter for MemoryExporter {
    async fn export(&self, spans: &[SpanData]) {
        self.exported.lock().await.extend_from_slice(spans);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub buffer_size: usize,
    pub flush_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 256,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// The one explicit process-scoped telemetry handle. Owns the span buffer
/// and exporter, and is passed by reference rather than looked up globally.
pub struct TelemetryManager {
    config: TelemetryConfig,
    buffer: Arc<Mutex<Vec<SpanData>>>,
    exporter: Arc<dyn TraceExporter>,
    span_counter: AtomicUsize,
}

impl TelemetryManager {
    pub fn new(config: TelemetryConfig, exporter: Arc<dyn TraceExporter>) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            exporter,
            span_counter: AtomicUsize::new(0),
        });

        if manager.config.enabled {
            let weak_buffer = manager.buffer.clone();
            let weak_exporter = manager.exporter.clone();
            let tick = manager.config.flush_interval;
            tokio::spawn(async move {
                let mut ticker = interval(tick);
                loop {
                    ticker.tick().await;
                    let drained: Vec<SpanData> = {
                        let mut buf = weak_buffer.lock().await;
                        std::mem::take(&mut *buf)
                    };
                    if !drained.is_empty() {
                        weak_exporter.export(&drained).await;
                    }
                }
            });
        }

        manager
    }

    pub fn start_span(&self, name: impl Into<String>, opts: SpanOptions) -> Span {
        self.span_counter.fetch_add(1, Ordering::Relaxed);
        let trace_id = opts.trace_id.unwrap_or_else(Uuid::new_v4);
        Span {
            data: SpanData {
                trace_id,
                span_id: Uuid::new_v4(),
                parent_span_id: opts.parent_span_id,
                name: name.into(),
                start: chrono::Utc::now(),
                end: None,
                attributes: opts.attributes,
                events: Vec::new(),
                status: SpanStatus::Unset,
            },
            started: std::time::Instant::now(),
        }
    }

    /// Runs `f` inside an active span, ending it on return (success or
    /// error) rather than via runtime decoration.
    pub async fn start_active_span<F, Fut, T>(&self, name: impl Into<String>, f: F) -> T
    where
        F: FnOnce(&mut Span) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let mut span = self.start_span(name, SpanOptions::default());
        let result = f(&mut span).await;
        self.end_span(span).await;
        result
    }

    pub async fn end_span(&self, span: Span) {
        if !self.config.enabled {
            return;
        }
        let data = span.finish();
        let mut buf = self.buffer.lock().await;
        buf.push(data);
        let should_flush = buf.len() >= self.config.buffer_size;
        let drained = if should_flush {
            Some(std::mem::take(&mut *buf))
        } else {
            None
        };
        drop(buf);
        if let Some(spans) = drained {
            self.exporter.export(&spans).await;
        }
    }

    /// Flushes any buffered spans and closes the exporter. Idempotent.
    pub async fn shutdown(&self) {
        let drained: Vec<SpanData> = {
            let mut buf = self.buffer.lock().await;
            std::mem::take(&mut *buf)
        };
        if !drained.is_empty() {
            self.exporter.export(&drained).await;
        }
        self.exporter.shutdown().await;
    }
}
