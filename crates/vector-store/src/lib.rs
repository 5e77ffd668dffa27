//! # Docrag Vector Store
//!
//! Storage half of the retrieval pipeline: chunk texts addressed by position,
//! an exact nearest-neighbour index over their embeddings, and the embedding
//! backends that produce those vectors.
//!
//! ## Architecture
//!
//! ```text
//! KnowledgeBase
//!     │
//!     ├──> Snapshot (Arc, swapped on commit)
//!     │      ├─> ChunkStore   position -> text   (chunks.json)
//!     │      └─> VectorIndex  position -> vector (index.bin)
//!     │
//!     ├──> StoreManifest      embedding model + dimension (manifest.json)
//!     │
//!     └──> WriteTxn           single writer, fs2 lock across processes
//! ```
//!
//! Vector `i` in the index always belongs to chunk `i` in the store. Readers
//! hold an immutable snapshot; a commit persists both artifacts before the
//! new snapshot becomes visible.
//!
//! ## Example
//!
//! ```no_run
//! use docrag_vector_store::{Embedder, KnowledgeBase, StoreLayout, StubEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = StubEmbedder::new(64);
//!     let kb = KnowledgeBase::open(StoreLayout::new("embeddings"), &embedder).await?;
//!
//!     let txn = kb.writer().await?;
//!     let chunks = vec!["Alpha beta.".to_string()];
//!     let vectors = embedder.embed_batch(txn.base().texts_to_embed(&chunks)).await?;
//!     let (next, _positions) = txn.base().extended(chunks, &vectors)?;
//!     txn.commit(next).await?;
//!
//!     let query = embedder.embed("alpha").await?;
//!     for hit in kb.snapshot().search(&query, 3)? {
//!         println!("{} {:.3}", hit.position, hit.distance);
//!     }
//!     Ok(())
//! }
//! ```

mod chunk_store;
mod embeddings;
mod error;
mod knowledge_base;
mod lock;
mod manifest;
mod paths;
mod types;
mod vector_index;

pub use chunk_store::ChunkStore;
pub use embeddings::{
    create_embedder, Embedder, EmbeddingConfig, EmbeddingMode, OnnxEmbedder, StubEmbedder,
    DEFAULT_DIMENSION, DEFAULT_MODEL_ID, EMBEDDING_MODEL_ENV, EMBEDDING_MODE_ENV, MODEL_DIR_ENV,
    STUB_MODEL_ID,
};
pub use error::{Result, VectorStoreError};
pub use knowledge_base::{KnowledgeBase, Snapshot, StoreStatus, WriteTxn};
pub use manifest::{StoreManifest, STORE_MANIFEST_SCHEMA_VERSION};
pub use paths::{
    StoreLayout, CHUNKS_FILE_NAME, DEFAULT_STORE_DIR, INDEX_FILE_NAME, LOCK_FILE_NAME,
    MANIFEST_FILE_NAME,
};
pub use types::SearchHit;
pub use vector_index::{squared_l2, VectorIndex};
