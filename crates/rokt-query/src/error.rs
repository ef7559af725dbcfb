use thiserror::Error;

use rokt_storage::StorageError;

/// Internal query-layer failures. The executor layer (§4.7) is the one
/// seam that turns these into a response code from the §4.6 table —
/// nothing upstream of it ever sees a raw `QueryError`.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid json in ADD")]
    InvalidJson,

    #[error("missing required field {0:?}")]
    MissingField(String),

    #[error("invalid rotation parameters")]
    InvalidRotationParams,

    #[error("unrecognised operator {0:?}")]
    UnknownOperator(String),

    #[error("unrecognised command")]
    Unrecognised,

    #[error("predicate evaluation failed")]
    PredicateFailure,

    #[error("dataset {0:?} already exists")]
    AlreadyExists(String),

    #[error("dataset {0:?} does not exist")]
    UnknownDataset(String),

    #[error("cannot delete dataset files")]
    DropFailed,

    #[error("cannot create dataset files")]
    CreateFailed,

    #[error("storage failure: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(name) => QueryError::AlreadyExists(name),
            StorageError::UnknownDataset(name) => QueryError::UnknownDataset(name),
            StorageError::CreateFailed(_) => QueryError::CreateFailed,
            StorageError::DropFailed(_) => QueryError::DropFailed,
            StorageError::InvalidRotationParams => QueryError::InvalidRotationParams,
            other @ StorageError::Io(_) => QueryError::Storage(other),
        }
    }
}

/// Maps an internal error to the canonical status code table (§4.6).
/// Unknown-dataset resolves to 567 uniformly, matching the code table
/// and the DELETE executor's documented behaviour (see DESIGN.md for
/// the resolution of the apparent 1-vs-567 tension in the source spec).
impl QueryError {
    pub fn status_code(&self) -> i32 {
        match self {
            QueryError::InvalidJson => 11,
            QueryError::MissingField(_) | QueryError::InvalidRotationParams => 12,
            QueryError::UnknownOperator(_) => 244,
            QueryError::Unrecognised | QueryError::CreateFailed => 423,
            QueryError::PredicateFailure => 3,
            QueryError::AlreadyExists(_) => 10,
            QueryError::UnknownDataset(_) => 567,
            QueryError::DropFailed => 457,
            QueryError::Storage(_) => 1,
        }
    }
}
