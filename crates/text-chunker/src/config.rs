use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Default chunk budget in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_OVERLAP: usize = 50;

/// Configuration for text splitting behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Upper bound on characters per chunk
    pub chunk_size: usize,

    /// Characters shared between the tail of one chunk and the head of the next
    pub overlap: usize,

    /// Boundaries to cut at, coarsest first. Raw character boundaries are always
    /// the last resort and do not need to be listed.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            separators: default_separators(),
        }
    }
}

impl SplitterConfig {
    /// Default separators with a custom size budget
    #[must_use]
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..Self::default()
        }
    }

    /// Replace the separator hierarchy
    #[must_use]
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::invalid_config("chunk_size must be > 0"));
        }

        if self.overlap >= self.chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }

        if self.separators.iter().any(String::is_empty) {
            return Err(ChunkerError::invalid_config(
                "separators must not contain the empty string",
            ));
        }

        Ok(())
    }
}

/// Paragraph, line, then word boundaries
#[must_use]
pub fn default_separators() -> Vec<String> {
    vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SplitterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.overlap, 50);
    }

    #[test]
    fn test_config_validation() {
        // Invalid: overlap == chunk_size
        assert!(SplitterConfig::new(10, 10).validate().is_err());

        // Invalid: overlap > chunk_size
        assert!(SplitterConfig::new(10, 20).validate().is_err());

        // Invalid: zero budget
        assert!(SplitterConfig::new(0, 0).validate().is_err());

        // Invalid: empty separator
        let config = SplitterConfig::new(10, 2).with_separators(["\n", ""]);
        assert!(config.validate().is_err());

        // Valid configuration
        assert!(SplitterConfig::new(10, 2).validate().is_ok());
        assert!(SplitterConfig::new(1, 0).validate().is_ok());
    }
}
