//! Filesystem watch service.
//!
//! A thin wrapper around `notify` that turns raw create/modify
//! notifications for media files into whole-file "ready" signals. Files
//! still being written are held back by a size-stability probe (two
//! consecutive equal size reads); vanished files are dropped silently.
//! Watcher errors degrade only the affected watch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use clipdock_model::WatchTargetId;

use crate::classify::AssetClassifier;
use crate::error::{IngestError, Result};

/// Stability-probe tuning.
#[derive(Clone, Debug)]
pub struct WatchServiceConfig {
    /// Delay between consecutive size reads while probing a growing file.
    pub stability_poll: Duration,
    /// Probe attempts before giving up on a file that never settles.
    pub stability_max_checks: u32,
}

impl Default for WatchServiceConfig {
    fn default() -> Self {
        Self {
            stability_poll: Duration::from_millis(500),
            stability_max_checks: 240,
        }
    }
}

/// A whole-file arrival signal, emitted once the file's size has settled.
#[derive(Clone, Debug)]
pub struct FileReady {
    pub key: WatchTargetId,
    pub path: PathBuf,
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

struct ActiveWatch {
    // Dropping the watcher stops the notify stream.
    _watcher: RecommendedWatcher,
    pump_task: JoinHandle<()>,
}

struct WatchShared {
    config: WatchServiceConfig,
    classifier: Arc<dyn AssetClassifier>,
    ready_tx: mpsc::Sender<FileReady>,
    watches: DashMap<WatchTargetId, ActiveWatch>,
    /// Paths with a stability probe already running.
    probes: DashMap<PathBuf, ()>,
}

/// Attaches notify watchers per directory and emits [`FileReady`] signals
/// on the channel supplied at construction.
#[derive(Clone)]
pub struct FolderWatchService {
    shared: Arc<WatchShared>,
}

impl fmt::Debug for FolderWatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderWatchService")
            .field("config", &self.shared.config)
            .field("watch_count", &self.shared.watches.len())
            .field("probe_count", &self.shared.probes.len())
            .finish()
    }
}

impl FolderWatchService {
    pub fn new(
        config: WatchServiceConfig,
        classifier: Arc<dyn AssetClassifier>,
        ready_tx: mpsc::Sender<FileReady>,
    ) -> Self {
        Self {
            shared: Arc::new(WatchShared {
                config,
                classifier,
                ready_tx,
                watches: DashMap::new(),
                probes: DashMap::new(),
            }),
        }
    }

    /// Attach a recursive watcher to `root`. Idempotent per key.
    pub async fn watch(&self, key: WatchTargetId, root: PathBuf) -> Result<()> {
        if self.shared.watches.contains_key(&key) {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<WatchMessage>(256);
        let watcher_root = root.clone();
        let watcher = spawn_blocking(move || init_watcher(&watcher_root, tx))
            .await
            .map_err(|err| {
                IngestError::Internal(format!("watcher initialization panicked: {err}"))
            })??;

        let pump_task = tokio::spawn(pump_events(key, Arc::clone(&self.shared), rx));
        self.shared.watches.insert(
            key,
            ActiveWatch {
                _watcher: watcher,
                pump_task,
            },
        );
        debug!(key = %key, root = %root.display(), "watching directory");
        Ok(())
    }

    /// Detach the watcher for a key, if any.
    pub fn unwatch(&self, key: WatchTargetId) {
        if let Some((_, watch)) = self.shared.watches.remove(&key) {
            watch.pump_task.abort();
        }
    }

    pub fn watch_count(&self) -> usize {
        self.shared.watches.len()
    }
}

fn init_watcher(root: &PathBuf, tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    let path_label = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let Err(err) = tx.blocking_send(WatchMessage::Event(event)) {
                    warn!(
                        "watch channel send failed for {}: {}",
                        path_label.display(),
                        err
                    );
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchMessage::Error(err.to_string()));
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| {
        IngestError::Internal(format!(
            "failed to create watcher for {}: {}",
            root.display(),
            err
        ))
    })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| {
            IngestError::Internal(format!("failed to watch {}: {}", root.display(), err))
        })?;

    Ok(watcher)
}

async fn pump_events(
    key: WatchTargetId,
    shared: Arc<WatchShared>,
    mut rx: mpsc::Receiver<WatchMessage>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WatchMessage::Event(event) => {
                if !is_arrival(&event.kind) {
                    continue;
                }
                for path in event.paths {
                    if !shared.classifier.is_media(&path) {
                        continue;
                    }
                    // One probe per path; repeated modify events while a
                    // copy is in progress all land on the same probe.
                    if shared.probes.insert(path.clone(), ()).is_some() {
                        continue;
                    }
                    tokio::spawn(probe_until_stable(key, Arc::clone(&shared), path));
                }
            }
            WatchMessage::Error(error) => {
                warn!(key = %key, error = %error, "watch stream error");
            }
        }
    }
}

fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    )
}

async fn probe_until_stable(key: WatchTargetId, shared: Arc<WatchShared>, path: PathBuf) {
    let stable = wait_for_stable_size(
        &path,
        shared.config.stability_poll,
        shared.config.stability_max_checks,
    )
    .await;
    shared.probes.remove(&path);

    match stable {
        Some(size) => {
            debug!(key = %key, path = %path.display(), size, "file size settled");
            if shared.ready_tx.send(FileReady { key, path }).await.is_err() {
                warn!(key = %key, "ready channel closed, dropping arrival");
            }
        }
        None => {
            debug!(key = %key, path = %path.display(), "file vanished or never settled");
        }
    }
}

/// Polls the file size until two consecutive reads agree. Returns the
/// settled size, or None when the file disappears or the attempt budget
/// runs out.
async fn wait_for_stable_size(path: &PathBuf, poll: Duration, max_checks: u32) -> Option<u64> {
    let mut last: Option<u64> = None;
    for _ in 0..max_checks.max(2) {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {
                let size = metadata.len();
                if last == Some(size) {
                    return Some(size);
                }
                last = Some(size);
            }
            Ok(_) => return None,
            Err(_) => return None,
        }
        sleep(poll).await;
    }
    None
}
