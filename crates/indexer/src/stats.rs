use serde::{Deserialize, Serialize};

/// Statistics about an ingestion run over one or more documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Number of documents committed
    pub documents: usize,

    /// Number of chunks appended to the store
    pub chunks: usize,

    /// Number of texts sent to the embedder, including recovered pending chunks
    pub embedded: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Per-document failures; the run continues past them
    pub errors: Vec<String>,
}

impl IngestStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, chunks: usize, embedded: usize) {
        self.documents += 1;
        self.chunks += chunks;
        self.embedded += embedded;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
