use crate::chunk_store::ChunkStore;
use crate::embeddings::Embedder;
use crate::error::{Result, VectorStoreError};
use crate::lock::{acquire_store_write_lock, StoreWriteLock};
use crate::manifest::StoreManifest;
use crate::paths::StoreLayout;
use crate::types::SearchHit;
use crate::vector_index::VectorIndex;
use serde::Serialize;
use std::ops::Range;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, MutexGuard};

/// An immutable, published pair of chunk store and vector index.
///
/// Position `i` of the index is the embedding of chunk `i`. The only way the
/// two lengths differ is a store recovered from an interrupted write, where
/// the trailing chunks are still waiting for vectors.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    chunks: ChunkStore,
    index: VectorIndex,
}

impl Snapshot {
    #[must_use]
    pub const fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    #[must_use]
    pub const fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Chunks that have no vector yet
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len().saturating_sub(self.index.len())
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.chunks.len() == self.index.len()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.index.search(query, k)
    }

    pub fn text(&self, position: usize) -> Result<&str> {
        self.chunks.get(position)
    }

    /// Texts that still need embedding before the next snapshot is aligned:
    /// every chunk without a vector followed by `new_chunks`.
    #[must_use]
    pub fn texts_to_embed(&self, new_chunks: &[String]) -> Vec<String> {
        let mut texts = self.chunks.tail(self.index.len()).to_vec();
        texts.extend_from_slice(new_chunks);
        texts
    }

    /// Next snapshot with `new_chunks` appended and `vectors` covering every
    /// chunk that lacked one. Returns the positions assigned to `new_chunks`.
    pub fn extended(
        &self,
        new_chunks: Vec<String>,
        vectors: &[Vec<f32>],
    ) -> Result<(Self, Range<usize>)> {
        let mut next = self.clone();
        let positions = next.chunks.append(new_chunks);
        next.index.add(vectors)?;
        if !next.is_aligned() {
            return Err(VectorStoreError::Misaligned {
                chunks: next.chunks.len(),
                vectors: next.index.len(),
            });
        }
        Ok((next, positions))
    }

    /// Next snapshot with `new_chunks` appended and a freshly computed index
    /// replacing the old one wholesale. `vectors` must cover every chunk.
    pub fn rebuilt(
        &self,
        new_chunks: Vec<String>,
        vectors: &[Vec<f32>],
    ) -> Result<(Self, Range<usize>)> {
        let mut chunks = self.chunks.clone();
        let positions = chunks.append(new_chunks);
        let mut index = self
            .index
            .dimension()
            .map_or_else(VectorIndex::new, VectorIndex::with_dimension);
        index.add(vectors)?;
        let next = Self { chunks, index };
        if !next.is_aligned() {
            return Err(VectorStoreError::Misaligned {
                chunks: next.chunks.len(),
                vectors: next.index.len(),
            });
        }
        Ok((next, positions))
    }
}

/// Counts reported by status endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub chunks: usize,
    pub vectors: usize,
    pub pending: usize,
    pub dimension: usize,
    pub embedding_model: String,
}

/// Owner of the chunk store and vector index, kept together behind one
/// publication point.
///
/// Readers take an `Arc<Snapshot>` and never wait on ingestion work; writers
/// are serialised and publish a complete new snapshot only after both
/// artifacts are on disk.
pub struct KnowledgeBase {
    layout: Option<StoreLayout>,
    model_id: String,
    dimension: usize,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl KnowledgeBase {
    /// Open (or create) the store at `layout` for vectors produced by `embedder`
    pub async fn open(layout: StoreLayout, embedder: &dyn Embedder) -> Result<Self> {
        log::info!("Opening knowledge base at {}", layout.dir().display());
        let snapshot =
            load_snapshot(&layout, embedder.model_id(), embedder.dimension()).await?;
        if snapshot.pending_chunks() > 0 {
            log::warn!(
                "{} of {} chunks have no vectors; they stay unsearchable until reconciled",
                snapshot.pending_chunks(),
                snapshot.chunks.len()
            );
        }
        Ok(Self {
            layout: Some(layout),
            model_id: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    /// A store that lives only in memory
    #[must_use]
    pub fn in_memory(embedder: &dyn Embedder) -> Self {
        let snapshot = Snapshot {
            chunks: ChunkStore::new(),
            index: VectorIndex::with_dimension(embedder.dimension()),
        };
        Self {
            layout: None,
            model_id: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn layout(&self) -> Option<&StoreLayout> {
        self.layout.as_ref()
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Fail unless `embedder` produces vectors in this store's embedding space
    pub fn ensure_embedder(&self, embedder: &dyn Embedder) -> Result<()> {
        if embedder.model_id() != self.model_id || embedder.dimension() != self.dimension {
            return Err(VectorStoreError::ModelMismatch {
                stored: self.model_id.clone(),
                stored_dimension: self.dimension,
                configured: embedder.model_id().to_string(),
                configured_dimension: embedder.dimension(),
            });
        }
        Ok(())
    }

    /// The currently published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        let snapshot = self.snapshot();
        StoreStatus {
            chunks: snapshot.chunks.len(),
            vectors: snapshot.index.len(),
            pending: snapshot.pending_chunks(),
            dimension: self.dimension,
            embedding_model: self.model_id.clone(),
        }
    }

    /// Become the single writer. Persisted stores are re-read under the
    /// cross-process lock so writes from other processes are never lost.
    pub async fn writer(&self) -> Result<WriteTxn<'_>> {
        let guard = self.writer.lock().await;
        let file_lock = match &self.layout {
            Some(layout) => {
                let lock = acquire_store_write_lock(layout.lock_path()).await?;
                let on_disk = load_snapshot(layout, &self.model_id, self.dimension).await?;
                let current = self.snapshot();
                if on_disk.chunks.len() != current.chunks.len()
                    || on_disk.index.len() != current.index.len()
                {
                    log::info!(
                        "Store changed on disk ({} chunks, {} vectors); refreshing",
                        on_disk.chunks.len(),
                        on_disk.index.len()
                    );
                    self.publish(on_disk);
                }
                Some(lock)
            }
            None => None,
        };
        Ok(WriteTxn {
            kb: self,
            base: self.snapshot(),
            _guard: guard,
            _file_lock: file_lock,
        })
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}

/// Exclusive write access to a [`KnowledgeBase`]
pub struct WriteTxn<'a> {
    kb: &'a KnowledgeBase,
    base: Arc<Snapshot>,
    _guard: MutexGuard<'a, ()>,
    _file_lock: Option<StoreWriteLock>,
}

impl WriteTxn<'_> {
    /// The snapshot this transaction builds on
    #[must_use]
    pub const fn base(&self) -> &Arc<Snapshot> {
        &self.base
    }

    /// Persist `next` and publish it. On any failure the published snapshot
    /// is left untouched and a reopened store loads that same snapshot.
    pub async fn commit(self, next: Snapshot) -> Result<Arc<Snapshot>> {
        if !next.is_aligned() {
            return Err(VectorStoreError::Misaligned {
                chunks: next.chunks.len(),
                vectors: next.index.len(),
            });
        }

        if let Some(layout) = &self.kb.layout {
            // The chunk file rename is the commit point. Anything written
            // before it is either truncated by open() (extra vectors) or
            // carries nothing load depends on (the manifest).
            next.index.save(layout.index_path()).await?;
            StoreManifest::new(&self.kb.model_id, self.kb.dimension, next.chunks.len())
                .save(layout.manifest_path())
                .await?;
            next.chunks.save(layout.chunks_path()).await?;
        }

        log::info!(
            "Committed snapshot: {} chunks ({} new)",
            next.chunks.len(),
            next.chunks.len().saturating_sub(self.base.chunks.len())
        );
        let next = Arc::new(next);
        *self
            .kb
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next.clone();
        Ok(next)
    }
}

async fn load_snapshot(layout: &StoreLayout, model_id: &str, dimension: usize) -> Result<Snapshot> {
    let chunks = ChunkStore::load(layout.chunks_path()).await?;
    let mut index = VectorIndex::load(layout.index_path()).await?;
    let manifest = StoreManifest::load(layout.manifest_path()).await?;

    let has_data = !chunks.is_empty() || !index.is_empty();
    if let Some(manifest) = manifest.filter(|_| has_data) {
        if manifest.embedding_model != model_id || manifest.dimension != dimension {
            return Err(VectorStoreError::ModelMismatch {
                stored: manifest.embedding_model,
                stored_dimension: manifest.dimension,
                configured: model_id.to_string(),
                configured_dimension: dimension,
            });
        }
    }

    match index.dimension() {
        Some(actual) if !index.is_empty() && actual != dimension => {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual,
            });
        }
        Some(actual) if actual == dimension => {}
        _ => index = VectorIndex::with_dimension(dimension),
    }

    if index.len() > chunks.len() {
        log::warn!(
            "Index holds {} vectors but only {} chunks were committed; dropping the uncommitted tail",
            index.len(),
            chunks.len()
        );
        index.truncate(chunks.len());
    }

    Ok(Snapshot { chunks, index })
}
