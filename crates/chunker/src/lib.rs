//! # Scholar Chunker
//!
//! Sentence-aware, token-budgeted chunking of extracted research-paper text.
//!
//! ## Pipeline
//!
//! ```text
//! Raw document text
//!     │
//!     ├──> Sentence segmentation (UAX #29, wrapped lines folded)
//!     │
//!     ├──> Greedy accumulation up to max_tokens
//!     │    └─> whole-sentence overlap seeded into the next chunk
//!     │
//!     └──> Embedding pass
//!          ├─> instruction + chunk checked against the model input budget
//!          ├─> over-budget chunks truncated in fixed token steps
//!          └─> unembeddable chunks dropped (counted, not fatal)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use scholar_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::lexical(ChunkerConfig::for_embeddings()).unwrap();
//! let chunks = chunker
//!     .chunk_document("We study sparse attention. It scales linearly. Results follow.")
//!     .unwrap();
//!
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].sentence_count, 3);
//! ```

mod chunker;
mod config;
mod error;
mod sentences;
mod tokenizer;
mod types;

pub use chunker::{Chunker, ChunkingStats};
pub use config::{ChunkerConfig, DEFAULT_EMBED_INSTRUCTION};
pub use error::{ChunkerError, Result};
pub use sentences::split_sentences;
pub use tokenizer::{TextTokenizer, DEFAULT_TRUNCATE_STEP};
pub use types::{Chunk, EmbeddingPass};
