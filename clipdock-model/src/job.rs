use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetKind;
use crate::consumer::ConsumerKind;
use crate::error::{ModelError, Result};
use crate::hash::ContentHash;
use crate::ids::{JobId, WatchTargetId};

/// A unit of import work handed from the broker to a consumer.
///
/// When `pending_hashes` is present it is positionally aligned with
/// `files`; the hashes stay pending until the consumer confirms the
/// import, at which point the broker commits the successful subset into
/// the owning watch target's synced set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Project file the consumer must have open for this job to be handed out.
    pub project_path: PathBuf,
    /// Destination bin/subpath inside the project, e.g. "Footage/Dailies".
    pub bin_path: String,
    /// Absolute paths to import, in order.
    pub files: Vec<PathBuf>,
    /// Which editor family should receive this job.
    pub consumer: ConsumerKind,
    /// Watch target that produced this job, when it came from folder sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_target_id: Option<WatchTargetId>,
    /// Positional content hashes awaiting commit; absent for one-shot imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_hashes: Option<Vec<ContentHash>>,
    /// Classifier tag, when the producer ran one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_kind: Option<AssetKind>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        project_path: PathBuf,
        bin_path: impl Into<String>,
        files: Vec<PathBuf>,
        consumer: ConsumerKind,
    ) -> Self {
        Self {
            id: JobId::new(),
            project_path,
            bin_path: bin_path.into(),
            files,
            consumer,
            watch_target_id: None,
            pending_hashes: None,
            asset_kind: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_pending_hashes(
        mut self,
        watch_target_id: WatchTargetId,
        hashes: Vec<ContentHash>,
    ) -> Self {
        self.watch_target_id = Some(watch_target_id);
        self.pending_hashes = Some(hashes);
        self
    }

    pub fn with_asset_kind(mut self, kind: AssetKind) -> Self {
        self.asset_kind = Some(kind);
        self
    }

    /// Structural well-formedness: a non-empty file list, and pending
    /// hashes either absent or aligned one-to-one with the files.
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(ModelError::EmptyFileList);
        }
        if let Some(hashes) = &self.pending_hashes
            && hashes.len() != self.files.len()
        {
            return Err(ModelError::MismatchedHashes {
                files: self.files.len(),
                hashes: hashes.len(),
            });
        }
        Ok(())
    }

    /// Pending hash for a given file, resolved through the positional mapping.
    pub fn hash_for(&self, file: &PathBuf) -> Option<&ContentHash> {
        let hashes = self.pending_hashes.as_ref()?;
        let index = self.files.iter().position(|f| f == file)?;
        hashes.get(index)
    }
}

/// The consumer's report of a job's outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    pub success: bool,
    /// Files the consumer imported during this job.
    #[serde(default)]
    pub imported: Vec<PathBuf>,
    /// Files the consumer could not import.
    #[serde(default)]
    pub failed: Vec<PathBuf>,
    /// Files already present in the target; success for dedup purposes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_imported: Option<Vec<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    /// Files whose pending hashes are eligible for commit: imported plus
    /// already-present. Failed files are deliberately excluded so a later
    /// retry of the same content is not treated as already-synced.
    pub fn committable_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.imported
            .iter()
            .chain(self.already_imported.iter().flatten())
    }
}
