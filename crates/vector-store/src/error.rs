use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Corrupt store file {path}: {reason}")]
    CorruptFile { path: String, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Position {position} out of range (store holds {len} chunks)")]
    OutOfRange { position: usize, len: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store was built with embedding model '{stored}' ({stored_dimension}d), but '{configured}' ({configured_dimension}d) is configured")]
    ModelMismatch {
        stored: String,
        stored_dimension: usize,
        configured: String,
        configured_dimension: usize,
    },

    #[error("Chunk store and vector index are misaligned: {chunks} chunks, {vectors} vectors")]
    Misaligned { chunks: usize, vectors: usize },

    #[error("{0}")]
    Other(String),
}

impl VectorStoreError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::CorruptFile {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Persistence failures (read or write of a store artifact)
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::IoError(_) | Self::SerializationError(_) | Self::CorruptFile { .. }
        )
    }
}
