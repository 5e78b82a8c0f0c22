use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("could not persist namespace file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("vector dimension mismatch: index has {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid vector dimension: {0}")]
    InvalidDimension(usize),
    #[error("{vectors} vectors cannot be paired with {records} metadata records")]
    LengthMismatch { vectors: usize, records: usize },
    #[error("corrupt index: {0}")]
    Corrupt(String),
    #[error("invalid namespace name: {0:?}")]
    InvalidNamespace(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
