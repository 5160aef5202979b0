//! Core data model definitions shared across clipdock crates.
#![allow(missing_docs)]

pub mod asset;
pub mod consumer;
pub mod error;
pub mod hash;
pub mod ids;
pub mod job;
pub mod watch;

// Intentionally curated re-exports for downstream consumers.
pub use asset::AssetKind;
pub use consumer::ConsumerKind;
pub use error::{ModelError, Result as ModelResult};
pub use hash::ContentHash;
pub use ids::{JobId, WatchTargetId};
pub use job::{Job, JobResult};
pub use watch::WatchTarget;
