use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad request parameters; rejected before any index is touched.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already indexed: {0}")]
    AlreadyIndexed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt index artifact {path}: {reason}")]
    CorruptArtifact { path: String, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().display().to_string(), source }
    }

    pub fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact { path: path.as_ref().display().to_string(), reason: reason.into() }
    }

    /// Errors the retrieval path tolerates: logged, then skipped.
    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;
