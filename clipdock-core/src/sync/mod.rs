//! Folder synchronization engine.
//!
//! Owns the watch-target runtime lifecycle (`Stopped → Watching → Stopped`)
//! and turns each flushed batch into exactly one job per target: hash every
//! file, drop content already committed for the target, and submit the rest
//! with pending hashes attached. Hashes are never inserted into the
//! committed set here; that happens only when the broker processes a
//! confirmed job result.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};

use clipdock_model::{ContentHash, Job, WatchTarget, WatchTargetId};

use crate::broker::JobBroker;
use crate::classify::AssetClassifier;
use crate::error::{IngestError, Result};
use crate::hash::ContentHasher;
use crate::store::TargetStore;

pub mod batcher;
pub mod watcher;

pub use batcher::{BatcherConfig, SyncBatch, SyncBatcher};
pub use watcher::{FileReady, FolderWatchService, WatchServiceConfig};

/// Observer hook for coarse sync progress and per-target errors.
pub trait SyncObserver: Send + Sync {
    fn on_progress(&self, _target: WatchTargetId, _hashed: usize, _total: usize) {}
    fn on_error(&self, _target: WatchTargetId, _error: &str) {}
}

/// No-op observer used when no status surface is wired up.
#[derive(Debug, Default)]
pub struct NoopSyncObserver;

impl SyncObserver for NoopSyncObserver {}

/// Engine-wide tuning, passed through to the batcher and watch service.
#[derive(Clone, Debug, Default)]
pub struct SyncEngineConfig {
    pub batcher: BatcherConfig,
    pub watcher: WatchServiceConfig,
}

/// Hash-filter-submit pipeline shared by debounced batches and full syncs.
#[derive(Clone)]
struct BatchPipeline {
    store: Arc<TargetStore>,
    broker: Arc<JobBroker>,
    observer: Arc<dyn SyncObserver>,
}

impl BatchPipeline {
    /// Filter a file list against the target's committed hashes and submit
    /// one job carrying the survivors with positional pending hashes.
    /// Returns the number of files queued.
    async fn filter_and_submit(
        &self,
        target: &WatchTarget,
        files: Vec<PathBuf>,
    ) -> Result<usize> {
        let synced = self.store.synced_snapshot(target.id).await?;
        let total = files.len();

        // Hashing is blocking metadata I/O; keep it off the protocol threads.
        let hashed: Vec<(PathBuf, Result<ContentHash>)> = spawn_blocking(move || {
            files
                .into_iter()
                .map(|path| {
                    let hash = ContentHasher::fingerprint(&path);
                    (path, hash)
                })
                .collect()
        })
        .await
        .map_err(|err| IngestError::Internal(format!("hash task panicked: {err}")))?;

        let mut batch_files = Vec::new();
        let mut batch_hashes = Vec::new();
        let mut seen: HashSet<ContentHash> = HashSet::new();
        for (index, (path, hash)) in hashed.into_iter().enumerate() {
            match hash {
                Ok(hash) => {
                    if synced.contains(&hash) {
                        debug!(
                            target = %target.id,
                            path = %path.display(),
                            "already synced, skipping"
                        );
                    } else if seen.insert(hash.clone()) {
                        batch_files.push(path);
                        batch_hashes.push(hash);
                    }
                }
                Err(err) => {
                    warn!(
                        target = %target.id,
                        path = %path.display(),
                        error = %err,
                        "failed to fingerprint file, excluding from batch"
                    );
                    self.observer.on_error(target.id, &err.to_string());
                }
            }
            self.observer.on_progress(target.id, index + 1, total);
        }

        if batch_files.is_empty() {
            return Ok(0);
        }

        let queued = batch_files.len();
        let job = Job::new(
            target.project_path.clone(),
            target.bin_path.clone(),
            batch_files,
            target.consumer,
        )
        .with_pending_hashes(target.id, batch_hashes);
        self.broker.submit(job).await?;

        info!(target = %target.id, queued, skipped = total - queued, "batch queued");
        Ok(queued)
    }

    async fn process(&self, batch: SyncBatch) {
        // Re-fetch so configuration edits apply to in-flight batches.
        let Some(target) = self.store.get(batch.target_id).await else {
            warn!(target = %batch.target_id, "batch for removed target, dropping");
            return;
        };
        if let Err(err) = self.filter_and_submit(&target, batch.files).await {
            warn!(target = %target.id, error = %err, "batch processing failed");
            self.observer.on_error(target.id, &err.to_string());
        }
    }
}

/// Orchestrates watchers, debouncing, and batch submission for all
/// configured watch targets.
pub struct FolderSyncEngine {
    store: Arc<TargetStore>,
    pipeline: BatchPipeline,
    batcher: SyncBatcher,
    watch_service: FolderWatchService,
    classifier: Arc<dyn AssetClassifier>,
    max_batch_files: usize,
    watching: Mutex<HashSet<WatchTargetId>>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for FolderSyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FolderSyncEngine");
        debug.field("batcher", &self.batcher);
        match self.watching.try_lock() {
            Ok(guard) => {
                debug.field("watching_count", &guard.len());
            }
            Err(_) => {
                debug.field("watching", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl FolderSyncEngine {
    pub fn new(
        store: Arc<TargetStore>,
        broker: Arc<JobBroker>,
        classifier: Arc<dyn AssetClassifier>,
        observer: Arc<dyn SyncObserver>,
        config: SyncEngineConfig,
    ) -> Self {
        let (flush_tx, mut flush_rx) = mpsc::channel::<SyncBatch>(64);
        let (ready_tx, mut ready_rx) = mpsc::channel::<FileReady>(256);

        let max_batch_files = config.batcher.max_batch_files;
        let batcher = SyncBatcher::new(config.batcher, flush_tx);
        let watch_service =
            FolderWatchService::new(config.watcher, Arc::clone(&classifier), ready_tx);

        let pipeline = BatchPipeline {
            store: Arc::clone(&store),
            broker,
            observer,
        };

        // Forward settled arrivals into the per-target debounce buffers.
        let ready_batcher = batcher.clone();
        let ready_task = tokio::spawn(async move {
            while let Some(ready) = ready_rx.recv().await {
                ready_batcher.on_file_ready(ready.key, ready.path).await;
            }
        });

        // Single consumer keeps per-target batches in arrival order.
        let flush_pipeline = pipeline.clone();
        let flush_task = tokio::spawn(async move {
            while let Some(batch) = flush_rx.recv().await {
                flush_pipeline.process(batch).await;
            }
        });

        Self {
            store,
            pipeline,
            batcher,
            watch_service,
            classifier,
            max_batch_files,
            watching: Mutex::new(HashSet::new()),
            background_tasks: vec![ready_task, flush_task],
        }
    }

    /// Begin watching a target and kick off its initial full sync.
    pub async fn start_target(&self, id: WatchTargetId) -> Result<()> {
        let target = self
            .store
            .get(id)
            .await
            .ok_or(IngestError::TargetNotFound(id))?;
        if !target.enabled {
            return Err(IngestError::TargetDisabled(id));
        }

        {
            let mut watching = self.watching.lock().await;
            if watching.contains(&id) {
                return Ok(());
            }
            watching.insert(id);
        }

        self.batcher.register(id);
        if let Err(err) = self.watch_service.watch(id, target.source_dir.clone()).await {
            self.batcher.unregister(id);
            self.watching.lock().await.remove(&id);
            return Err(err);
        }

        info!(
            target = %id,
            source = %target.source_dir.display(),
            project = %target.project_path.display(),
            "watch target started"
        );
        self.resync_target(id).await?;
        Ok(())
    }

    /// Stop watching a target. Idempotent; buffered events are discarded.
    pub async fn stop_target(&self, id: WatchTargetId) {
        let was_watching = self.watching.lock().await.remove(&id);
        self.watch_service.unwatch(id);
        self.batcher.unregister(id);
        if was_watching {
            info!(target = %id, "watch target stopped");
        }
    }

    /// Stop-then-start.
    pub async fn restart_target(&self, id: WatchTargetId) -> Result<()> {
        self.stop_target(id).await;
        self.start_target(id).await
    }

    /// Force a full pass over everything currently in the source directory,
    /// chunked into the usual one-job-per-target shape.
    pub async fn resync_target(&self, id: WatchTargetId) -> Result<usize> {
        let target = self
            .store
            .get(id)
            .await
            .ok_or(IngestError::TargetNotFound(id))?;

        let root = target.source_dir.clone();
        let classifier = Arc::clone(&self.classifier);
        let files = spawn_blocking(move || collect_media_files(&root, classifier.as_ref()))
            .await
            .map_err(|err| IngestError::Internal(format!("directory walk panicked: {err}")))??;

        let mut queued = 0;
        for chunk in files.chunks(self.max_batch_files.max(1)) {
            queued += self
                .pipeline
                .filter_and_submit(&target, chunk.to_vec())
                .await?;
        }
        info!(target = %id, scanned = files.len(), queued, "full sync complete");
        Ok(queued)
    }

    /// Start every enabled target in the store. Individual failures degrade
    /// that one target, never the engine.
    pub async fn start_enabled_targets(&self) {
        for target in self.store.list().await {
            if !target.enabled {
                continue;
            }
            if let Err(err) = self.start_target(target.id).await {
                warn!(target = %target.id, error = %err, "failed to start watch target");
                self.pipeline.observer.on_error(target.id, &err.to_string());
            }
        }
    }

    pub async fn is_watching(&self, id: WatchTargetId) -> bool {
        self.watching.lock().await.contains(&id)
    }

    /// Tear down every watcher and the background loops.
    pub async fn shutdown(&self) {
        let ids: Vec<_> = self.watching.lock().await.drain().collect();
        for id in ids {
            self.watch_service.unwatch(id);
            self.batcher.unregister(id);
        }
        for task in &self.background_tasks {
            task.abort();
        }
    }
}

/// Recursively collect media files under `root`, sorted for deterministic
/// batch order. Unreadable subdirectories are skipped with a log.
fn collect_media_files(root: &Path, classifier: &dyn AssetClassifier) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
                if !hidden && classifier.is_media(&path) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use clipdock_model::ConsumerKind;

    use crate::broker::BrokerConfig;
    use crate::classify::ExtensionClassifier;

    struct Fixture {
        store: Arc<TargetStore>,
        broker: Arc<JobBroker>,
        engine: FolderSyncEngine,
        target_id: WatchTargetId,
        source_dir: PathBuf,
        _tmp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let source_dir = tmp.path().join("incoming");
        fs::create_dir(&source_dir).unwrap();

        let store = Arc::new(
            TargetStore::load(tmp.path().join("state.toml"))
                .await
                .unwrap(),
        );
        let target = WatchTarget::new(
            source_dir.clone(),
            PathBuf::from("/edit/p.proj"),
            "Footage",
            ConsumerKind::Premiere,
        );
        let target_id = target.id;
        store.upsert(target).await.unwrap();

        let broker = Arc::new(JobBroker::new(BrokerConfig::default(), Arc::clone(&store)));
        let engine = FolderSyncEngine::new(
            Arc::clone(&store),
            Arc::clone(&broker),
            Arc::new(ExtensionClassifier::default()),
            Arc::new(NoopSyncObserver),
            SyncEngineConfig::default(),
        );

        Fixture {
            store,
            broker,
            engine,
            target_id,
            source_dir,
            _tmp: tmp,
        }
    }

    async fn poll_for(fx: &Fixture) -> Option<Job> {
        fx.broker
            .report_active(ConsumerKind::Premiere, Some(PathBuf::from("/edit/p.proj")))
            .await;
        fx.broker.poll(ConsumerKind::Premiere).await
    }

    #[tokio::test]
    async fn full_sync_queues_one_job_with_pending_hashes() {
        let fx = fixture().await;
        fs::write(fx.source_dir.join("a.wav"), b"aaaa").unwrap();
        fs::write(fx.source_dir.join("b.wav"), b"bbbbbb").unwrap();
        fs::write(fx.source_dir.join("notes.txt"), b"not media").unwrap();

        let queued = fx.engine.resync_target(fx.target_id).await.unwrap();
        assert_eq!(queued, 2);

        let job = poll_for(&fx).await.unwrap();
        assert_eq!(job.files.len(), 2);
        assert_eq!(job.bin_path, "Footage");
        assert_eq!(job.watch_target_id, Some(fx.target_id));
        assert_eq!(job.pending_hashes.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn committed_content_is_filtered_before_a_job_forms() {
        let fx = fixture().await;
        let file = fx.source_dir.join("a.wav");
        fs::write(&file, b"aaaa").unwrap();

        fx.engine.resync_target(fx.target_id).await.unwrap();
        let job = poll_for(&fx).await.unwrap();

        // Consumer confirms the import; the hash is committed.
        fx.broker
            .report_result(clipdock_model::JobResult {
                job_id: job.id,
                success: true,
                imported: job.files.clone(),
                failed: vec![],
                already_imported: None,
                error: None,
            })
            .await
            .unwrap();

        // A second full pass over the same content queues nothing.
        let queued = fx.engine.resync_target(fx.target_id).await.unwrap();
        assert_eq!(queued, 0);
        assert!(poll_for(&fx).await.is_none());
    }

    #[tokio::test]
    async fn uncommitted_content_is_requeued_on_resync() {
        let fx = fixture().await;
        fs::write(fx.source_dir.join("a.wav"), b"aaaa").unwrap();

        // First pass queues the file but no result ever arrives.
        assert_eq!(fx.engine.resync_target(fx.target_id).await.unwrap(), 1);
        // The hash was never committed, so a forced resync re-queues it.
        assert_eq!(fx.engine.resync_target(fx.target_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn identical_recreated_file_is_filtered_by_hash() {
        let fx = fixture().await;
        let file = fx.source_dir.join("a.wav");
        fs::write(&file, b"aaaa").unwrap();
        let mtime = fs::metadata(&file).unwrap().modified().unwrap();

        fx.engine.resync_target(fx.target_id).await.unwrap();
        let job = poll_for(&fx).await.unwrap();
        fx.broker
            .report_result(clipdock_model::JobResult {
                job_id: job.id,
                success: true,
                imported: job.files.clone(),
                failed: vec![],
                already_imported: None,
                error: None,
            })
            .await
            .unwrap();

        // Delete and recreate with identical name, size, and mtime: the
        // fingerprint matches, so it never reaches a job.
        fs::remove_file(&file).unwrap();
        fs::write(&file, b"aaaa").unwrap();
        let handle = fs::File::options().write(true).open(&file).unwrap();
        handle.set_modified(mtime).unwrap();
        drop(handle);

        assert_eq!(fx.engine.resync_target(fx.target_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn vanished_files_are_excluded_without_failing_the_batch() {
        let fx = fixture().await;
        fs::write(fx.source_dir.join("a.wav"), b"aaaa").unwrap();

        let target = fx.store.get(fx.target_id).await.unwrap();
        let queued = fx
            .engine
            .pipeline
            .filter_and_submit(
                &target,
                vec![
                    fx.source_dir.join("a.wav"),
                    fx.source_dir.join("vanished.wav"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(queued, 1);
        let job = poll_for(&fx).await.unwrap();
        assert_eq!(job.files, vec![fx.source_dir.join("a.wav")]);
    }

    #[tokio::test]
    async fn lifecycle_stopped_watching_stopped() {
        let fx = fixture().await;
        assert!(!fx.engine.is_watching(fx.target_id).await);

        fx.engine.start_target(fx.target_id).await.unwrap();
        assert!(fx.engine.is_watching(fx.target_id).await);
        // Idempotent.
        fx.engine.start_target(fx.target_id).await.unwrap();

        fx.engine.stop_target(fx.target_id).await;
        assert!(!fx.engine.is_watching(fx.target_id).await);
        fx.engine.shutdown().await;
    }

    #[tokio::test]
    async fn disabled_target_refuses_to_start() {
        let fx = fixture().await;
        fx.store.set_enabled(fx.target_id, false).await.unwrap();

        let result = fx.engine.start_target(fx.target_id).await;
        assert!(matches!(result, Err(IngestError::TargetDisabled(_))));
        assert!(!fx.engine.is_watching(fx.target_id).await);
    }

    #[tokio::test]
    async fn collect_media_files_skips_hidden_and_non_media() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("day1");
        fs::create_dir(&nested).unwrap();
        fs::write(tmp.path().join("a.wav"), b"a").unwrap();
        fs::write(nested.join("b.mov"), b"b").unwrap();
        fs::write(tmp.path().join(".DS_Store"), b"junk").unwrap();
        fs::write(tmp.path().join("readme.md"), b"text").unwrap();

        let classifier = ExtensionClassifier::default();
        let files = collect_media_files(tmp.path(), &classifier).unwrap();
        assert_eq!(files.len(), 2);
    }
}
