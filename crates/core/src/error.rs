use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocQaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid namespace name: {0:?}")]
    InvalidNamespace(String),
    #[error("extraction failed for {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },
    #[error("unsupported input format: {0:?}")]
    UnsupportedInput(PathBuf),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DocQaError>;

impl DocQaError {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<anyhow::Error> for DocQaError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<toml::de::Error> for DocQaError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config(value.to_string())
    }
}
