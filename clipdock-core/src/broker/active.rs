//! Active-target records per consumer family.
//!
//! Consumers report the project they currently have open every few seconds;
//! the broker only trusts a record inside a short freshness window, because
//! a consumer that stopped reporting may have switched projects or closed
//! without notice. Staleness is a passive clock comparison, no signaling.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use clipdock_model::ConsumerKind;

use crate::paths::normalize_project_path;

#[derive(Clone, Debug)]
struct ActiveRecord {
    /// Normalized project path, or None while no project is open.
    project_path: Option<PathBuf>,
    reported_at: Instant,
}

/// Thread-safe "what is in front of the user right now" record, one per
/// consumer family. Updated from the report path, read from `poll`.
#[derive(Default)]
pub struct ActiveTargetTracker {
    records: Mutex<HashMap<ConsumerKind, ActiveRecord>>,
}

impl fmt::Debug for ActiveTargetTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ActiveTargetTracker");
        match self.records.try_lock() {
            Ok(guard) => {
                debug.field("consumer_count", &guard.len());
            }
            Err(_) => {
                debug.field("records", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl ActiveTargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the record for a consumer family. No history is kept.
    pub async fn update(&self, consumer: ConsumerKind, project_path: Option<&Path>) {
        let normalized = project_path.map(normalize_project_path);
        debug!(
            consumer = %consumer,
            project = normalized.as_deref().map(|p| p.display().to_string()),
            "active target reported"
        );
        self.records.lock().await.insert(
            consumer,
            ActiveRecord {
                project_path: normalized,
                reported_at: Instant::now(),
            },
        );
    }

    /// Last-reported project regardless of freshness.
    pub async fn current_path(&self, consumer: ConsumerKind) -> Option<PathBuf> {
        let guard = self.records.lock().await;
        guard.get(&consumer).and_then(|r| r.project_path.clone())
    }

    pub async fn is_fresh(&self, consumer: ConsumerKind, window: Duration) -> bool {
        let guard = self.records.lock().await;
        guard
            .get(&consumer)
            .map(|r| r.reported_at.elapsed() <= window)
            .unwrap_or(false)
    }

    /// The project a fresh record points at; None when the record is
    /// missing, stale, or reports no open project.
    pub async fn fresh_path(&self, consumer: ConsumerKind, window: Duration) -> Option<PathBuf> {
        let guard = self.records.lock().await;
        let record = guard.get(&consumer)?;
        if record.reported_at.elapsed() > window {
            return None;
        }
        record.project_path.clone()
    }
}
