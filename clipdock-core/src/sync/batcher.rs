//! Per-target debounce buffers.
//!
//! A burst of file-ready signals for one watch target collapses into a
//! single flushed batch: every arrival restarts that target's quiet-period
//! timer, so a steady trickle keeps deferring the flush until the folder
//! goes quiet. Targets are fully independent; flushing one never blocks
//! notifications for another.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use clipdock_model::WatchTargetId;

/// Debounce tuning.
#[derive(Clone, Debug)]
pub struct BatcherConfig {
    /// Quiet period a target must observe before its buffer flushes.
    pub debounce_window: Duration,
    /// Hard cap forcing an early flush during sustained arrivals.
    pub max_batch_files: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_secs(2),
            max_batch_files: 512,
        }
    }
}

/// One coalesced flush for a target.
#[derive(Clone, Debug)]
pub struct SyncBatch {
    pub target_id: WatchTargetId,
    pub files: Vec<PathBuf>,
}

struct TargetBuffer {
    tx: mpsc::Sender<PathBuf>,
    debounce_task: JoinHandle<()>,
}

struct BatcherShared {
    config: BatcherConfig,
    flush_tx: mpsc::Sender<SyncBatch>,
    buffers: DashMap<WatchTargetId, TargetBuffer>,
}

/// Converts bursts of per-file notifications into one batch per target.
#[derive(Clone)]
pub struct SyncBatcher {
    shared: Arc<BatcherShared>,
}

impl fmt::Debug for SyncBatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBatcher")
            .field("config", &self.shared.config)
            .field("buffer_count", &self.shared.buffers.len())
            .finish()
    }
}

impl SyncBatcher {
    pub fn new(config: BatcherConfig, flush_tx: mpsc::Sender<SyncBatch>) -> Self {
        Self {
            shared: Arc::new(BatcherShared {
                config,
                flush_tx,
                buffers: DashMap::new(),
            }),
        }
    }

    /// Start buffering events for a target. Idempotent.
    pub fn register(&self, target_id: WatchTargetId) {
        if self.shared.buffers.contains_key(&target_id) {
            return;
        }
        let capacity = self.shared.config.max_batch_files.max(64) * 2;
        let (tx, rx) = mpsc::channel::<PathBuf>(capacity);
        let debounce_task = tokio::spawn(debounce_loop(
            target_id,
            rx,
            self.shared.config.clone(),
            self.shared.flush_tx.clone(),
        ));
        self.shared
            .buffers
            .insert(target_id, TargetBuffer { tx, debounce_task });
    }

    /// Stop buffering and drop anything accumulated: a stopped target must
    /// not deliver a late flush.
    pub fn unregister(&self, target_id: WatchTargetId) {
        if let Some((_, buffer)) = self.shared.buffers.remove(&target_id) {
            buffer.debounce_task.abort();
        }
    }

    /// Append a ready file and reset the target's quiet-period timer.
    pub async fn on_file_ready(&self, target_id: WatchTargetId, path: PathBuf) {
        let tx = match self.shared.buffers.get(&target_id) {
            Some(buffer) => buffer.tx.clone(),
            None => {
                debug!(target = %target_id, path = %path.display(), "event for unwatched target, dropping");
                return;
            }
        };
        if tx.send(path).await.is_err() {
            warn!(target = %target_id, "debounce loop gone, dropping event");
        }
    }

    #[cfg(test)]
    pub fn buffer_count(&self) -> usize {
        self.shared.buffers.len()
    }
}

async fn debounce_loop(
    target_id: WatchTargetId,
    mut rx: mpsc::Receiver<PathBuf>,
    config: BatcherConfig,
    flush_tx: mpsc::Sender<SyncBatch>,
) {
    let mut pending: Vec<PathBuf> = Vec::new();

    loop {
        let msg = if pending.is_empty() {
            rx.recv().await
        } else {
            match timeout(config.debounce_window, rx.recv()).await {
                Ok(msg) => msg,
                Err(_) => {
                    // Quiet period elapsed.
                    if !flush(target_id, &mut pending, &flush_tx).await {
                        break;
                    }
                    continue;
                }
            }
        };

        let Some(path) = msg else {
            let _ = flush(target_id, &mut pending, &flush_tx).await;
            break;
        };

        // The watcher can emit the same path twice within one window.
        if !pending.contains(&path) {
            pending.push(path);
        }
        if pending.len() >= config.max_batch_files
            && !flush(target_id, &mut pending, &flush_tx).await
        {
            break;
        }
    }
}

async fn flush(
    target_id: WatchTargetId,
    pending: &mut Vec<PathBuf>,
    flush_tx: &mpsc::Sender<SyncBatch>,
) -> bool {
    if pending.is_empty() {
        return true;
    }
    let files = std::mem::take(pending);
    debug!(target = %target_id, files = files.len(), "flushing debounced batch");
    flush_tx
        .send(SyncBatch { target_id, files })
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batcher_with_rx(window_ms: u64) -> (SyncBatcher, mpsc::Receiver<SyncBatch>) {
        let (flush_tx, flush_rx) = mpsc::channel(16);
        let batcher = SyncBatcher::new(
            BatcherConfig {
                debounce_window: Duration::from_millis(window_ms),
                max_batch_files: 512,
            },
            flush_tx,
        );
        (batcher, flush_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_batch() {
        let (batcher, mut flush_rx) = batcher_with_rx(2_000);
        let target = WatchTargetId::new();
        batcher.register(target);

        for name in ["a.wav", "b.wav", "c.wav"] {
            batcher
                .on_file_ready(target, PathBuf::from(format!("/in/{name}")))
                .await;
        }

        let batch = flush_rx.recv().await.unwrap();
        assert_eq!(batch.target_id, target);
        assert_eq!(batch.files.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn events_after_the_window_form_a_second_batch() {
        let (batcher, mut flush_rx) = batcher_with_rx(2_000);
        let target = WatchTargetId::new();
        batcher.register(target);

        batcher.on_file_ready(target, PathBuf::from("/in/a.wav")).await;
        let first = flush_rx.recv().await.unwrap();
        assert_eq!(first.files, vec![PathBuf::from("/in/a.wav")]);

        batcher.on_file_ready(target, PathBuf::from("/in/b.wav")).await;
        let second = flush_rx.recv().await.unwrap();
        assert_eq!(second.files, vec![PathBuf::from("/in/b.wav")]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_paths_collapse_within_a_window() {
        let (batcher, mut flush_rx) = batcher_with_rx(2_000);
        let target = WatchTargetId::new();
        batcher.register(target);

        batcher.on_file_ready(target, PathBuf::from("/in/a.wav")).await;
        batcher.on_file_ready(target, PathBuf::from("/in/a.wav")).await;

        let batch = flush_rx.recv().await.unwrap();
        assert_eq!(batch.files.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn max_batch_cap_forces_an_early_flush() {
        let (flush_tx, mut flush_rx) = mpsc::channel(16);
        let batcher = SyncBatcher::new(
            BatcherConfig {
                debounce_window: Duration::from_secs(3600),
                max_batch_files: 2,
            },
            flush_tx,
        );
        let target = WatchTargetId::new();
        batcher.register(target);

        batcher.on_file_ready(target, PathBuf::from("/in/a.wav")).await;
        batcher.on_file_ready(target, PathBuf::from("/in/b.wav")).await;

        // The timer never fires in this test; only the cap can flush.
        let batch = flush_rx.recv().await.unwrap();
        assert_eq!(batch.files.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_target_never_flushes() {
        let (batcher, mut flush_rx) = batcher_with_rx(100);
        let target = WatchTargetId::new();
        batcher.register(target);

        batcher.on_file_ready(target, PathBuf::from("/in/a.wav")).await;
        batcher.unregister(target);
        assert_eq!(batcher.buffer_count(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(flush_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn targets_flush_independently() {
        let (batcher, mut flush_rx) = batcher_with_rx(2_000);
        let one = WatchTargetId::new();
        let two = WatchTargetId::new();
        batcher.register(one);
        batcher.register(two);

        batcher.on_file_ready(one, PathBuf::from("/one/a.wav")).await;
        batcher.on_file_ready(two, PathBuf::from("/two/b.wav")).await;

        let mut seen = vec![flush_rx.recv().await.unwrap(), flush_rx.recv().await.unwrap()];
        seen.sort_by_key(|b| b.files[0].clone());
        assert_eq!(seen[0].target_id, one);
        assert_eq!(seen[1].target_id, two);
    }
}
