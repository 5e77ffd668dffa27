use thiserror::Error;

/// Result type for splitter operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while splitting text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkerError {
    /// Invalid configuration (fatal, never retried)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
