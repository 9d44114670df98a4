//! File-system watcher producing debounced, batched change events for the
//! indexer coordinator. Activates the `notify` dependency (already present
//! in the dependency table but unused by any module until now).

use crate::error::{EngineError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawChangeKind {
    Add,
    Change,
    Unlink,
}

#[derive(Debug, Clone)]
struct RawChangeEvent {
    path: PathBuf,
    kind: RawChangeKind,
    at: Instant,
}

/// Deduplicated, ready-to-process batch of file changes.
#[derive(Debug, Clone, Default)]
pub struct FileChangeBatch {
    pub files_to_update: Vec<PathBuf>,
    pub files_to_remove: Vec<PathBuf>,
}

impl FileChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.files_to_update.is_empty() && self.files_to_remove.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Watching,
    Processing,
    Stopping,
}

impl WatcherState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WatcherState::Stopped,
            1 => WatcherState::Starting,
            2 => WatcherState::Watching,
            3 => WatcherState::Processing,
            _ => WatcherState::Stopping,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WatcherState::Stopped => 0,
            WatcherState::Starting => 1,
            WatcherState::Watching => 2,
            WatcherState::Processing => 3,
            WatcherState::Stopping => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub max_batch_size: usize,
    pub include_globs: Vec<String>,
    pub ignore_globs: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_batch_size: 500,
            include_globs: vec!["**/*".to_string()],
            ignore_globs: vec!["**/.git/**".to_string(), "**/target/**".to_string(), "**/node_modules/**".to_string()],
        }
    }
}

fn glob_to_regex(glob: &str) -> Regex {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '.' => pattern.push_str(r"\."),
            '?' => pattern.push('.'),
            other => pattern.push(other),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).unwrap_or_else(|_| Regex::new("^$").unwrap())
}

fn matches_any(path: &str, globs: &[Regex]) -> bool {
    globs.iter().any(|g| g.is_match(path))
}

/// Watches a directory tree, debounces raw filesystem events, and emits
/// deduplicated [`FileChangeBatch`]es through an mpsc channel that the
/// indexer coordinator consumes — a one-way channel, never a callback back
/// into the watcher, to avoid a watcher/coordinator/store cycle.
pub struct FileWatcher {
    config: WatcherConfig,
    state: Arc<AtomicU8>,
    pending: Arc<Mutex<HashMap<PathBuf, RawChangeEvent>>>,
    _watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            state: Arc::new(AtomicU8::new(WatcherState::Stopped.as_u8())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            _watcher: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Start watching `root`, returning a receiver of deduplicated batches.
    /// Idempotent: calling `start` while already watching is a no-op.
    pub async fn start(&mut self, root: impl AsRef<Path>) -> Result<mpsc::Receiver<FileChangeBatch>> {
        if self.state() != WatcherState::Stopped {
            return Err(EngineError::invalid_argument("watcher already started"));
        }
        self.state.store(WatcherState::Starting.as_u8(), Ordering::SeqCst);

        let include: Vec<Regex> = self.config.include_globs.iter().map(|g| glob_to_regex(g)).collect();
        let ignore: Vec<Regex> = self.config.ignore_globs.iter().map(|g| glob_to_regex(g)).collect();

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<RawChangeEvent>();
        let watcher_state = self.state.clone();
        let pending = self.pending.clone();
        let debounce = self.config.debounce;
        let max_batch_size = self.config.max_batch_size;
        let (batch_tx, batch_rx) = mpsc::channel::<FileChangeBatch>(16);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let kind = match event.kind {
                        EventKind::Create(_) => RawChangeKind::Add,
                        EventKind::Modify(_) => RawChangeKind::Change,
                        EventKind::Remove(_) => RawChangeKind::Unlink,
                        _ => return,
                    };
                    for path in event.paths {
                        let path_str = path.to_string_lossy().to_string();
                        if matches_any(&path_str, &ignore) {
                            continue;
                        }
                        if !include.is_empty() && !matches_any(&path_str, &include) {
                            continue;
                        }
                        let _ = raw_tx.send(RawChangeEvent {
                            path,
                            kind,
                            at: Instant::now(),
                        });
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| EngineError::Filesystem {
            message: format!("failed to create watcher: {e}"),
            context: HashMap::new(),
        })?;

        watcher
            .watch(root.as_ref(), RecursiveMode::Recursive)
            .map_err(|e| EngineError::Filesystem {
                message: format!("failed to watch {}: {e}", root.as_ref().display()),
                context: HashMap::new(),
            })?;

        self._watcher = Some(watcher);
        self.state.store(WatcherState::Watching.as_u8(), Ordering::SeqCst);

        tokio::spawn(async move {
            loop {
                let timeout = tokio::time::sleep(debounce);
                tokio::pin!(timeout);

                tokio::select! {
                    maybe_event = raw_rx.recv() => {
                        let Some(event) = maybe_event else { break; };
                        let mut buf = pending.lock().await;
                        buf.insert(event.path.clone(), event);
                        let full = buf.len() >= max_batch_size;
                        drop(buf);
                        if full {
                            flush(&pending, &watcher_state, &batch_tx).await;
                        }
                    }
                    _ = &mut timeout => {
                        let is_empty = pending.lock().await.is_empty();
                        if !is_empty {
                            flush(&pending, &watcher_state, &batch_tx).await;
                        }
                    }
                }
            }
        });

        Ok(batch_rx)
    }

    /// Idempotent stop; safe to call even if never started.
    pub fn stop(&mut self) {
        if self.state() == WatcherState::Stopped {
            return;
        }
        self.state.store(WatcherState::Stopping.as_u8(), Ordering::SeqCst);
        self._watcher = None;
        self.state.store(WatcherState::Stopped.as_u8(), Ordering::SeqCst);
    }
}

async fn flush(
    pending: &Arc<Mutex<HashMap<PathBuf, RawChangeEvent>>>,
    state: &Arc<AtomicU8>,
    batch_tx: &mpsc::Sender<FileChangeBatch>,
) {
    state.store(WatcherState::Processing.as_u8(), Ordering::SeqCst);

    let drained: Vec<RawChangeEvent> = {
        let mut buf = pending.lock().await;
        buf.drain().map(|(_, v)| v).collect()
    };

    let mut batch = FileChangeBatch::default();
    for event in drained {
        match event.kind {
            RawChangeKind::Unlink => batch.files_to_remove.push(event.path),
            RawChangeKind::Add | RawChangeKind::Change => batch.files_to_update.push(event.path),
        }
    }

    if !batch.is_empty() {
        debug!(
            updates = batch.files_to_update.len(),
            removals = batch.files_to_remove.len(),
            "flushing file change batch"
        );
        if batch_tx.send(batch).await.is_err() {
            warn!("file change batch receiver dropped");
        }
    }

    state.store(WatcherState::Watching.as_u8(), Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_to_regex_matches_recursive_wildcard() {
        let re = glob_to_regex("**/.git/**");
        assert!(re.is_match("/repo/.git/HEAD"));
    }

    #[tokio::test]
    async fn start_is_not_idempotent_while_already_watching() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FileWatcher::new(WatcherConfig::default());
        let _rx = watcher.start(dir.path()).await.unwrap();
        assert_eq!(watcher.state(), WatcherState::Watching);
        assert!(watcher.start(dir.path()).await.is_err());
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut watcher = FileWatcher::new(WatcherConfig::default());
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }
}
