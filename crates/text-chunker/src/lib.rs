//! # docrag Text Chunker
//!
//! Deterministic splitting of extracted document text into overlapping chunks
//! sized for embedding.
//!
//! ## Strategy
//!
//! ```text
//! Raw text
//!     │
//!     ├──> Window of at most `chunk_size` characters
//!     │
//!     ├──> Cut at the coarsest boundary inside the window
//!     │    ├─> paragraph ("\n\n")
//!     │    ├─> line ("\n")
//!     │    ├─> word (" ")
//!     │    └─> raw character
//!     │
//!     └──> Next window starts `overlap` characters before the cut
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docrag_text_chunker::{SplitterConfig, TextSplitter};
//!
//! let splitter = TextSplitter::new(SplitterConfig::new(10, 2)).unwrap();
//! let chunks = splitter.split("Alpha beta. Gamma delta.");
//! assert_eq!(chunks[0], "Alpha");
//! assert_eq!(chunks[1], "ha beta.");
//! ```

mod config;
mod error;
mod splitter;

pub use config::{default_separators, SplitterConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use error::{ChunkerError, Result};
pub use splitter::{split, TextSplitter};
