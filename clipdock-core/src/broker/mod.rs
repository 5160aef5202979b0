//! The job broker: the single integration point between producers (folder
//! sync, downloads intake, direct API calls) and the sandboxed consumers
//! that can only poll for work.
//!
//! Delivery is gated on a fresh active-target report so a job for project B
//! is never handed to a consumer sitting in project A. Dedup state (content
//! hashes) is committed exactly once, only after the consumer confirms the
//! import; a failed file's hash is never committed, so the content stays
//! eligible for a later pass.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use clipdock_model::{ConsumerKind, Job, JobId, JobResult};

use crate::error::Result;
use crate::paths::normalize_project_path;
use crate::store::TargetStore;

pub mod active;

pub use active::ActiveTargetTracker;

/// Broker tuning knobs.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// How recent an active-target report must be for `poll` to trust it.
    pub freshness_window: Duration,
    /// How long a dequeued job waits for its result before the broker gives
    /// up on the hash-commit opportunity and drops the entry.
    pub sent_job_ttl: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(10),
            sent_job_ttl: Duration::from_secs(600),
        }
    }
}

struct SentJob {
    job: Job,
    sent_at: Instant,
}

#[derive(Default)]
struct BrokerState {
    pending: HashMap<ConsumerKind, VecDeque<Job>>,
    sent: HashMap<JobId, SentJob>,
}

/// In-process job broker. One instance per process, shared by handle.
pub struct JobBroker {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
    active: ActiveTargetTracker,
    store: Arc<TargetStore>,
}

impl fmt::Debug for JobBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("JobBroker");
        debug.field("config", &self.config);
        match self.state.try_lock() {
            Ok(state) => {
                let pending: usize = state.pending.values().map(|q| q.len()).sum();
                debug
                    .field("pending_count", &pending)
                    .field("sent_count", &state.sent.len());
            }
            Err(_) => {
                debug.field("state", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl JobBroker {
    pub fn new(config: BrokerConfig, store: Arc<TargetStore>) -> Self {
        Self {
            config,
            state: Mutex::new(BrokerState::default()),
            active: ActiveTargetTracker::new(),
            store,
        }
    }

    /// Enqueue a job for its consumer family. Only structural validation;
    /// safe to call concurrently from any producer.
    pub async fn submit(&self, job: Job) -> Result<()> {
        job.validate()?;
        debug!(
            job = %job.id,
            consumer = %job.consumer,
            files = job.files.len(),
            project = %job.project_path.display(),
            "job submitted"
        );
        let mut state = self.state.lock().await;
        self.sweep_sent(&mut state);
        state.pending.entry(job.consumer).or_default().push_back(job);
        Ok(())
    }

    /// Record what the consumer is working on right now. Called repeatedly
    /// while the consumer idles; `None` means no project is open.
    pub async fn report_active(&self, consumer: ConsumerKind, project_path: Option<PathBuf>) {
        self.active.update(consumer, project_path.as_deref()).await;
    }

    /// Last-reported project for a family, ignoring freshness. Used by
    /// one-shot producers that need a destination at submit time.
    pub async fn current_project(&self, consumer: ConsumerKind) -> Option<PathBuf> {
        self.active.current_path(consumer).await
    }

    /// Hand out the oldest pending job matching the consumer's fresh active
    /// target. Returns None (and leaves the queue untouched) when the
    /// active record is missing or stale, or when nothing matches; pending
    /// jobs wait rather than being sent blind.
    pub async fn poll(&self, consumer: ConsumerKind) -> Option<Job> {
        let active = self
            .active
            .fresh_path(consumer, self.config.freshness_window)
            .await?;

        let mut state = self.state.lock().await;
        self.sweep_sent(&mut state);

        let queue = state.pending.get_mut(&consumer)?;
        let index = queue
            .iter()
            .position(|job| normalize_project_path(&job.project_path) == active)?;
        let job = queue.remove(index)?;

        state.sent.insert(
            job.id,
            SentJob {
                job: job.clone(),
                sent_at: Instant::now(),
            },
        );
        info!(job = %job.id, consumer = %consumer, "job handed to consumer");
        Some(job)
    }

    /// Record a consumer's outcome report. Commits the pending hashes of
    /// files that were imported or already present, skips the hashes of
    /// failed files, then discards the sent entry regardless of outcome.
    pub async fn report_result(&self, result: JobResult) -> Result<()> {
        let sent = {
            let mut state = self.state.lock().await;
            state.sent.remove(&result.job_id)
        };

        let Some(SentJob { job, .. }) = sent else {
            warn!(job = %result.job_id, "result for unknown or expired job, ignoring");
            return Ok(());
        };

        if !result.failed.is_empty() {
            warn!(
                job = %job.id,
                failed = result.failed.len(),
                error = result.error.as_deref().unwrap_or(""),
                "job reported per-file failures"
            );
        }

        let Some(target_id) = job.watch_target_id else {
            // One-shot import with no dedup tracking.
            return Ok(());
        };
        if job.pending_hashes.is_none() {
            return Ok(());
        }

        let mut hashes = Vec::new();
        for file in result.committable_files() {
            match job.hash_for(file) {
                Some(hash) => hashes.push(hash.clone()),
                None => warn!(
                    job = %job.id,
                    file = %file.display(),
                    "result names a file outside the job, skipping"
                ),
            }
        }

        if !hashes.is_empty() {
            let inserted = self
                .store
                .commit_hashes(target_id, hashes, Utc::now())
                .await?;
            info!(job = %job.id, target = %target_id, inserted, "sync state committed");
        }
        Ok(())
    }

    /// Drop sent entries whose result never arrived. Also runs
    /// opportunistically inside submit/poll; the server calls this on a
    /// timer to bound memory growth from abandoned consumers.
    pub async fn expire_sent(&self) -> usize {
        let mut state = self.state.lock().await;
        self.sweep_sent(&mut state)
    }

    fn sweep_sent(&self, state: &mut BrokerState) -> usize {
        let ttl = self.config.sent_job_ttl;
        let before = state.sent.len();
        state.sent.retain(|id, entry| {
            let keep = entry.sent_at.elapsed() <= ttl;
            if !keep {
                warn!(job = %id, "sent job expired without a result, dropping");
            }
            keep
        });
        before - state.sent.len()
    }

    #[cfg(test)]
    pub async fn pending_len(&self, consumer: ConsumerKind) -> usize {
        let state = self.state.lock().await;
        state.pending.get(&consumer).map(|q| q.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub async fn sent_len(&self) -> usize {
        self.state.lock().await.sent.len()
    }
}
