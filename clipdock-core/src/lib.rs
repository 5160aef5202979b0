//! Core ingest runtime: folder watching, debounced batching, the job
//! broker with its active-target gate, and the persisted watch-target
//! store. The server crate wires these together behind the HTTP surface.

pub mod api;
pub mod broker;
pub mod classify;
pub mod downloads;
pub mod error;
pub mod hash;
pub mod paths;
pub mod store;
pub mod sync;

pub use broker::{ActiveTargetTracker, BrokerConfig, JobBroker};
pub use classify::{AssetClassifier, ExtensionClassifier};
pub use downloads::{DownloadsConfig, DownloadsWatcher};
pub use error::{IngestError, Result};
pub use hash::ContentHasher;
pub use paths::normalize_project_path;
pub use store::TargetStore;
pub use sync::{
    BatcherConfig, FolderSyncEngine, NoopSyncObserver, SyncEngineConfig, SyncObserver,
    WatchServiceConfig,
};
