//! Downloads-folder intake.
//!
//! A lighter sibling of the folder sync engine: one watched directory,
//! no batching and no hash ledger. Each settled media file becomes a
//! single-file job routed at the project the consumer most recently
//! reported open. With no known project the file is skipped with a log;
//! nothing is queued speculatively, so these jobs are one-shot by
//! construction.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use clipdock_model::{ConsumerKind, Job, WatchTargetId};

use crate::broker::JobBroker;
use crate::classify::AssetClassifier;
use crate::error::Result;
use crate::sync::{FileReady, FolderWatchService, WatchServiceConfig};

#[derive(Clone, Debug)]
pub struct DownloadsConfig {
    /// Directory scanned for ad-hoc arrivals, typically the user's
    /// browser download location.
    pub dir: PathBuf,
    /// Bin the one-shot imports land in.
    pub bin_path: String,
    /// Consumer family the intake routes to.
    pub consumer: ConsumerKind,
}

/// Watches a single downloads directory and submits one-shot jobs.
pub struct DownloadsWatcher {
    watch_service: FolderWatchService,
    key: WatchTargetId,
    forward_task: JoinHandle<()>,
}

impl fmt::Debug for DownloadsWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadsWatcher")
            .field("key", &self.key)
            .finish()
    }
}

impl DownloadsWatcher {
    /// Attach the watcher and start forwarding arrivals to the broker.
    pub async fn start(
        config: DownloadsConfig,
        broker: Arc<JobBroker>,
        classifier: Arc<dyn AssetClassifier>,
        watch_config: WatchServiceConfig,
    ) -> Result<Self> {
        let (ready_tx, mut ready_rx) = mpsc::channel::<FileReady>(64);
        let watch_service =
            FolderWatchService::new(watch_config, Arc::clone(&classifier), ready_tx);

        // Synthetic key: this watch has no configured target behind it.
        let key = WatchTargetId::new();
        watch_service.watch(key, config.dir.clone()).await?;
        info!(dir = %config.dir.display(), "downloads intake started");

        let forward_task = tokio::spawn(async move {
            while let Some(ready) = ready_rx.recv().await {
                submit_one_shot(&broker, classifier.as_ref(), &config, ready.path).await;
            }
        });

        Ok(Self {
            watch_service,
            key,
            forward_task,
        })
    }

    pub fn stop(&self) {
        self.watch_service.unwatch(self.key);
        self.forward_task.abort();
    }
}

async fn submit_one_shot(
    broker: &JobBroker,
    classifier: &dyn AssetClassifier,
    config: &DownloadsConfig,
    path: PathBuf,
) {
    let Some(project) = broker.current_project(config.consumer).await else {
        debug!(
            path = %path.display(),
            consumer = %config.consumer,
            "no known project for consumer, skipping download"
        );
        return;
    };

    let mut job = Job::new(
        project,
        config.bin_path.clone(),
        vec![path.clone()],
        config.consumer,
    );
    if let Some(kind) = classifier.classify(&path) {
        job = job.with_asset_kind(kind);
    }

    match broker.submit(job).await {
        Ok(()) => info!(path = %path.display(), "queued download for import"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to queue download"),
    }
}
