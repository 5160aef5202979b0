use clipdock_model::ModelError;
use clipdock_model::WatchTargetId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State document serialize error: {0}")]
    StateEncode(#[from] toml::ser::Error),

    #[error("State document parse error: {0}")]
    StateDecode(#[from] toml::de::Error),

    #[error("Invalid job: {0}")]
    InvalidJob(#[from] ModelError),

    #[error("Watch target not found: {0}")]
    TargetNotFound(WatchTargetId),

    #[error("Watch target {0} is disabled")]
    TargetDisabled(WatchTargetId),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
