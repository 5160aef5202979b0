use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use clipdock_core::{BrokerConfig, DownloadsConfig, SyncEngineConfig, WatchServiceConfig};
use clipdock_model::ConsumerKind;

/// Server configuration loaded via environment variables (and optionally an
/// ingest tuning file).
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    /// Watch-target state document.
    pub state_path: PathBuf,

    /// Downloads intake directory; intake is disabled when unset.
    pub downloads_dir: Option<PathBuf>,

    // Development settings
    pub dev_mode: bool,

    /// Ingest tuning: debounce, freshness, stability probing.
    pub ingest: IngestConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let ingest = IngestConfig::load_from_env()?;

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8787".to_string())
                .parse()
                .unwrap_or(8787),

            state_path: env::var("CLIPDOCK_STATE_PATH")
                .unwrap_or_else(|_| "./clipdock-state.toml".to_string())
                .into(),

            downloads_dir: env::var("CLIPDOCK_DOWNLOADS_DIR").ok().map(PathBuf::from),

            dev_mode: env::var("DEV_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            ingest,
        })
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            freshness_window: Duration::from_secs(self.ingest.broker.freshness_window_secs),
            sent_job_ttl: Duration::from_secs(self.ingest.broker.sent_job_ttl_secs),
        }
    }

    pub fn sync_config(&self) -> SyncEngineConfig {
        let mut config = SyncEngineConfig::default();
        config.batcher.debounce_window = Duration::from_millis(self.ingest.sync.debounce_ms);
        config.batcher.max_batch_files = self.ingest.sync.max_batch_files;
        config.watcher.stability_poll = Duration::from_millis(self.ingest.sync.stability_poll_ms);
        config.watcher.stability_max_checks = self.ingest.sync.stability_max_checks;
        config
    }

    pub fn downloads_config(&self) -> Option<DownloadsConfig> {
        self.downloads_dir.as_ref().map(|dir| DownloadsConfig {
            dir: dir.clone(),
            bin_path: self.ingest.downloads.bin_path.clone(),
            consumer: self.ingest.downloads.consumer,
        })
    }

    pub fn downloads_watch_config(&self) -> WatchServiceConfig {
        let mut config = WatchServiceConfig::default();
        config.stability_poll = Duration::from_millis(self.ingest.sync.stability_poll_ms);
        config.stability_max_checks = self.ingest.sync.stability_max_checks;
        config
    }
}

/// Top-level ingest settings. Loaded from `CLIPDOCK_CONFIG` (TOML) when set,
/// otherwise every field falls back to its default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub sync: SyncSettings,
    pub broker: BrokerSettings,
    pub downloads: DownloadsSettings,
}

impl IngestConfig {
    pub fn load_from_env() -> anyhow::Result<Self> {
        match env::var("CLIPDOCK_CONFIG") {
            Ok(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read ingest config at {path}"))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse ingest config at {path}"))
            }
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Folder-sync tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Quiet period (ms) a folder must observe before its batch flushes.
    /// Raise this for slow network copies that pause between files.
    pub debounce_ms: u64,
    /// Hard cap on files per batch; sustained arrivals flush early at this
    /// size instead of growing one enormous job.
    pub max_batch_files: usize,
    /// Delay (ms) between size probes while a file is still being written.
    pub stability_poll_ms: u64,
    /// Probe attempts before a never-settling file is dropped.
    pub stability_max_checks: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            max_batch_files: 512,
            stability_poll_ms: 500,
            stability_max_checks: 240,
        }
    }
}

/// Job-broker tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// How recent (seconds) a consumer's active-project report must be for
    /// polls to release jobs. Should comfortably exceed the panel's
    /// reporting interval.
    pub freshness_window_secs: u64,
    /// How long (seconds) an unacknowledged sent job is remembered before
    /// its content becomes eligible for redelivery.
    pub sent_job_ttl_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            freshness_window_secs: 10,
            sent_job_ttl_secs: 600,
        }
    }
}

/// Downloads-intake tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadsSettings {
    /// Bin one-shot download imports land in.
    pub bin_path: String,
    /// Consumer family the intake routes to.
    pub consumer: ConsumerKind,
}

impl Default for DownloadsSettings {
    fn default() -> Self {
        Self {
            bin_path: "Downloads".to_string(),
            consumer: ConsumerKind::Premiere,
        }
    }
}
