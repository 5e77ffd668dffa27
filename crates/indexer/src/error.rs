use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid splitter configuration: {0}")]
    Config(#[from] docrag_text_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] docrag_vector_store::VectorStoreError),

    #[error("No extractable text in {0}")]
    NoExtractableText(String),

    #[error("Failed to read document {path}: {reason}")]
    Document { path: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub(crate) fn document(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Document {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}
