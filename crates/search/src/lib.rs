//! # Docrag Search
//!
//! Answers similarity queries against a [`docrag_vector_store::KnowledgeBase`]:
//! embed the query, run exact search over one snapshot, and map positions back
//! to chunk text.

mod error;
mod retriever;

pub use error::{Result, SearchError};
pub use retriever::{RetrievalResult, Retriever, DEFAULT_TOP_K};
