use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("dataset {0:?} already exists")]
    AlreadyExists(String),

    #[error("dataset {0:?} does not exist")]
    UnknownDataset(String),

    #[error("failed to create dataset directory or file: {0}")]
    CreateFailed(#[source] std::io::Error),

    #[error("failed to remove dataset directory: {0}")]
    DropFailed(#[source] std::io::Error),

    #[error("invalid rotation parameters")]
    InvalidRotationParams,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
