use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] docrag_vector_store::VectorStoreError),

    #[error("Query must not be empty")]
    InvalidQuery,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index returned position {position} but the store holds {len} chunks")]
    Consistency { position: usize, len: usize },
}

impl SearchError {
    /// Whether the caller, not the system, is at fault
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery | Self::InvalidArgument(_))
    }
}
