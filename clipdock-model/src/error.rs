use thiserror::Error;

/// Structural validation failures raised by model types.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("pending hash count {hashes} does not match file count {files}")]
    MismatchedHashes { files: usize, hashes: usize },

    #[error("job has no files")]
    EmptyFileList,

    #[error("unknown consumer kind: {0}")]
    UnknownConsumer(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
