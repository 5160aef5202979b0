//! Persisted watch-target state.
//!
//! Targets (including their committed hash sets) live in a single TOML
//! document that is rewritten after every mutation. Serialization happens
//! under the same write guard as the mutation so a concurrent commit can
//! never produce a torn snapshot, and the document is swapped in with a
//! temp-file rename so a crash mid-write leaves the previous state intact.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use clipdock_model::{ContentHash, WatchTarget, WatchTargetId};

use crate::error::{IngestError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct TargetDocument {
    #[serde(default)]
    targets: Vec<WatchTarget>,
}

/// Owner of all persisted watch-target state.
pub struct TargetStore {
    path: PathBuf,
    inner: RwLock<TargetDocument>,
}

impl fmt::Debug for TargetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TargetStore");
        debug.field("path", &self.path);
        match self.inner.try_read() {
            Ok(guard) => {
                debug.field("target_count", &guard.targets.len());
            }
            Err(_) => {
                debug.field("targets", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl TargetStore {
    /// Load the state document, or start empty when none exists yet.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let document: TargetDocument = toml::from_str(&raw)?;
                info!(
                    path = %path.display(),
                    targets = document.targets.len(),
                    "loaded watch-target state"
                );
                document
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state document yet, starting empty");
                TargetDocument::default()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            inner: RwLock::new(document),
        })
    }

    pub async fn get(&self, id: WatchTargetId) -> Option<WatchTarget> {
        let guard = self.inner.read().await;
        guard.targets.iter().find(|t| t.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<WatchTarget> {
        self.inner.read().await.targets.clone()
    }

    /// Committed hash set for one target, as a snapshot the sync engine can
    /// filter a whole batch against without re-locking per file.
    pub async fn synced_snapshot(&self, id: WatchTargetId) -> Result<HashSet<ContentHash>> {
        let guard = self.inner.read().await;
        guard
            .targets
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.synced_hashes.clone())
            .ok_or(IngestError::TargetNotFound(id))
    }

    /// Insert or replace a target configuration and persist.
    pub async fn upsert(&self, target: WatchTarget) -> Result<()> {
        let mut guard = self.inner.write().await;
        match guard.targets.iter_mut().find(|t| t.id == target.id) {
            Some(existing) => *existing = target,
            None => guard.targets.push(target),
        }
        self.persist(&guard).await
    }

    /// Remove a target; returns whether it existed.
    pub async fn remove(&self, id: WatchTargetId) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let before = guard.targets.len();
        guard.targets.retain(|t| t.id != id);
        let removed = guard.targets.len() != before;
        if removed {
            self.persist(&guard).await?;
        }
        Ok(removed)
    }

    pub async fn set_enabled(&self, id: WatchTargetId, enabled: bool) -> Result<()> {
        let mut guard = self.inner.write().await;
        let target = guard
            .targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(IngestError::TargetNotFound(id))?;
        target.enabled = enabled;
        self.persist(&guard).await
    }

    /// Commit hashes confirmed imported for a target. Idempotent set-insert:
    /// re-committing a hash already present is a no-op, which keeps the
    /// at-most-once property when two batches for the same content are in
    /// flight concurrently. Returns the number of newly inserted hashes.
    pub async fn commit_hashes(
        &self,
        id: WatchTargetId,
        hashes: Vec<ContentHash>,
        synced_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut guard = self.inner.write().await;
        let target = guard
            .targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(IngestError::TargetNotFound(id))?;

        let mut inserted = 0;
        for hash in hashes {
            if target.synced_hashes.insert(hash) {
                inserted += 1;
            }
        }
        target.last_synced_at = Some(synced_at);
        self.persist(&guard).await?;

        debug!(target = %id, inserted, "committed content hashes");
        Ok(inserted)
    }

    async fn persist(&self, document: &TargetDocument) -> Result<()> {
        let raw = toml::to_string_pretty(document)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
