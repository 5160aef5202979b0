use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consumer::ConsumerKind;
use crate::hash::ContentHash;
use crate::ids::WatchTargetId;

/// A configured folder → project → bin binding monitored by the sync engine.
///
/// `synced_hashes` only ever grows through committed job results; the sync
/// engine reads it to filter already-delivered content but never inserts
/// speculatively.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchTarget {
    pub id: WatchTargetId,
    /// Directory watched for new media.
    pub source_dir: PathBuf,
    /// Project file acting as the routing key for produced jobs.
    pub project_path: PathBuf,
    /// Destination bin/subpath shared by every batch from this target.
    pub bin_path: String,
    pub consumer: ConsumerKind,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Content hashes confirmed imported for this target.
    #[serde(default)]
    pub synced_hashes: HashSet<ContentHash>,
}

impl WatchTarget {
    pub fn new(
        source_dir: PathBuf,
        project_path: PathBuf,
        bin_path: impl Into<String>,
        consumer: ConsumerKind,
    ) -> Self {
        Self {
            id: WatchTargetId::new(),
            source_dir,
            project_path,
            bin_path: bin_path.into(),
            consumer,
            enabled: true,
            last_synced_at: None,
            synced_hashes: HashSet::new(),
        }
    }

    pub fn is_synced(&self, hash: &ContentHash) -> bool {
        self.synced_hashes.contains(hash)
    }
}
