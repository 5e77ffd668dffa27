//! # Docrag Indexer
//!
//! Turns documents into searchable chunks.
//!
//! ## Pipeline
//!
//! ```text
//! Document (.pdf / text)
//!     │
//!     ├──> Extraction (pdf-extract, UTF-8)
//!     │      └─> Raw text
//!     │
//!     ├──> TextSplitter (chunk_size / overlap)
//!     │      └─> Chunks
//!     │
//!     ├──> Embedder (batch)
//!     │      └─> Vectors for new and pending chunks
//!     │
//!     └──> KnowledgeBase commit
//!            └─> chunks.json + index.bin, published together
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docrag_indexer::{IngestionPipeline, PipelineConfig};
//! use docrag_vector_store::{create_embedder, EmbeddingConfig, KnowledgeBase, StoreLayout};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = create_embedder(&EmbeddingConfig::stub())?;
//!     let kb = KnowledgeBase::open(StoreLayout::default(), embedder.as_ref()).await?;
//!     let pipeline = IngestionPipeline::new(Arc::new(kb), embedder, PipelineConfig::default())?;
//!
//!     let outcome = pipeline.ingest_file("data/cons.pdf").await?;
//!     println!("Stored chunks {:?}", outcome.positions);
//!     Ok(())
//! }
//! ```

mod document;
mod error;
mod pipeline;
mod stats;

pub use document::{extract_text, DocumentKind};
pub use error::{IndexerError, Result};
pub use pipeline::{IngestOutcome, IngestionPipeline, PipelineConfig, RebuildPolicy};
pub use stats::IngestStats;
