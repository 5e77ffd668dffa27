use crate::document::extract_text;
use crate::error::{IndexerError, Result};
use crate::stats::IngestStats;
use docrag_text_chunker::{SplitterConfig, TextSplitter};
use docrag_vector_store::{Embedder, KnowledgeBase, Snapshot, VectorStoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// How the vector index is brought up to date on each ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildPolicy {
    /// Embed only chunks without a vector and append them
    #[default]
    Incremental,
    /// Re-embed every chunk and replace the index
    Full,
}

impl FromStr for RebuildPolicy {
    type Err = IndexerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            other => Err(IndexerError::Other(format!(
                "unknown rebuild policy '{other}' (expected incremental or full)"
            ))),
        }
    }
}

impl fmt::Display for RebuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::Full => f.write_str("full"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub splitter: SplitterConfig,
    pub rebuild_policy: RebuildPolicy,
}

/// Result of committing one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Store positions assigned to the new chunks
    pub positions: Range<usize>,
    pub chunks_added: usize,
    /// Texts embedded for this commit; more than `chunks_added` when pending
    /// chunks were recovered or the index was rebuilt
    pub vectors_embedded: usize,
}

/// Split, embed and commit documents into a [`KnowledgeBase`].
///
/// Nothing becomes visible to readers until both chunks and vectors have
/// been persisted, and a failure at any step leaves the store as it was.
pub struct IngestionPipeline {
    kb: Arc<KnowledgeBase>,
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    policy: RebuildPolicy,
}

impl IngestionPipeline {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        embedder: Arc<dyn Embedder>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(config.splitter)?;
        kb.ensure_embedder(embedder.as_ref())?;
        Ok(Self {
            kb,
            embedder,
            splitter,
            policy: config.rebuild_policy,
        })
    }

    #[must_use]
    pub const fn policy(&self) -> RebuildPolicy {
        self.policy
    }

    #[must_use]
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    /// Ingest raw text
    pub async fn ingest(&self, text: &str) -> Result<IngestOutcome> {
        let chunks = self.splitter.split(text);
        if chunks.is_empty() {
            return Err(IndexerError::NoExtractableText("input text".to_string()));
        }
        self.commit_chunks(chunks).await
    }

    /// Extract, then ingest, one document from disk
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<IngestOutcome> {
        let path = path.as_ref();
        log::info!("Ingesting {}", path.display());
        let text = extract_text(path).await?;
        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            return Err(IndexerError::NoExtractableText(path.display().to_string()));
        }
        self.commit_chunks(chunks).await
    }

    /// Ingest documents one by one. A failing document is recorded and skipped;
    /// earlier commits stay in place.
    pub async fn ingest_files<P: AsRef<Path>>(&self, paths: &[P]) -> IngestStats {
        let start = Instant::now();
        let mut stats = IngestStats::new();
        for path in paths {
            let path = path.as_ref();
            match self.ingest_file(path).await {
                Ok(outcome) => {
                    stats.add_document(outcome.chunks_added, outcome.vectors_embedded);
                }
                Err(err) => {
                    log::warn!("Skipping {}: {err}", path.display());
                    stats.add_error(format!("{}: {err}", path.display()));
                }
            }
        }
        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Ingested {} documents ({} chunks, {} failed) in {}ms",
            stats.documents,
            stats.chunks,
            stats.errors.len(),
            stats.time_ms
        );
        stats
    }

    /// Embed chunks that were committed without vectors. Returns how many
    /// were recovered.
    pub async fn reconcile(&self) -> Result<usize> {
        let txn = self.kb.writer().await?;
        let base = txn.base().clone();
        let pending = base.pending_chunks();
        if pending == 0 {
            log::info!("Store is aligned; nothing to reconcile");
            return Ok(0);
        }
        let vectors = self.embed(base.texts_to_embed(&[])).await?;
        let (next, _) = base.extended(Vec::new(), &vectors)?;
        txn.commit(next).await?;
        log::info!("Reconciled {pending} pending chunks");
        Ok(pending)
    }

    /// Re-embed every stored chunk and replace the index. Returns the number
    /// of vectors in the new index.
    pub async fn rebuild(&self) -> Result<usize> {
        let txn = self.kb.writer().await?;
        let base = txn.base().clone();
        let vectors = self.embed(all_texts(&base)).await?;
        let (next, _) = base.rebuilt(Vec::new(), &vectors)?;
        let count = next.index().len();
        txn.commit(next).await?;
        log::info!("Rebuilt index over {count} chunks");
        Ok(count)
    }

    async fn commit_chunks(&self, chunks: Vec<String>) -> Result<IngestOutcome> {
        let chunks_added = chunks.len();
        let txn = self.kb.writer().await?;
        let base = txn.base().clone();

        let (next, positions, vectors_embedded) = match self.policy {
            RebuildPolicy::Incremental => {
                let vectors = self.embed(base.texts_to_embed(&chunks)).await?;
                let embedded = vectors.len();
                let (next, positions) = base.extended(chunks, &vectors)?;
                (next, positions, embedded)
            }
            RebuildPolicy::Full => {
                let mut texts = all_texts(&base);
                texts.extend_from_slice(&chunks);
                let vectors = self.embed(texts).await?;
                let embedded = vectors.len();
                let (next, positions) = base.rebuilt(chunks, &vectors)?;
                (next, positions, embedded)
            }
        };

        txn.commit(next).await?;
        log::info!(
            "Committed {chunks_added} chunks at positions {}..{} ({vectors_embedded} embedded)",
            positions.start,
            positions.end
        );
        Ok(IngestOutcome {
            positions,
            chunks_added,
            vectors_embedded,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        log::debug!("Embedding {expected} texts with {}", self.embedder.model_id());
        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != expected {
            return Err(VectorStoreError::EmbeddingError(format!(
                "embedder returned {} vectors for {expected} texts",
                vectors.len()
            ))
            .into());
        }
        Ok(vectors)
    }
}

fn all_texts(snapshot: &Snapshot) -> Vec<String> {
    snapshot.chunks().iter().map(ToString::to_string).collect()
}
