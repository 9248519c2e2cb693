//! # Scholar Vector Store
//!
//! Embedding generation and per-collection similarity search for paper chunks.
//!
//! ## Architecture
//!
//! ```text
//! chunk texts
//!     │
//!     ├──> EmbeddingBatcher
//!     │      ├─> batches of 12, sent one after another
//!     │      ├─> transient failures retried with linear backoff
//!     │      └─> BatchOutcome (successful batches + recorded failures)
//!     │
//!     ├──> pair_embeddings (per batch, shorter side wins)
//!     │
//!     └──> VectorStore
//!            ├─> upsert / query / get_all per collection
//!            └─> LocalVectorStore: one JSON file per collection
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use scholar_vector_store::{
//!     BatchConfig, EmbeddingBatcher, LocalVectorStore, StoredEntry, StubEmbedder, VectorStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> scholar_vector_store::Result<()> {
//!     let provider = Arc::new(StubEmbedder::default());
//!     let batcher = EmbeddingBatcher::new(provider, BatchConfig::default())?;
//!     let store = LocalVectorStore::open("collections").await?;
//!
//!     let texts = vec!["Sparse attention scales linearly.".to_string()];
//!     let pairs = batcher.embed_texts(&texts).await?.into_pairs();
//!     let entries = pairs
//!         .items
//!         .into_iter()
//!         .enumerate()
//!         .map(|(i, item)| StoredEntry {
//!             id: i.to_string(),
//!             text: item.text,
//!             vector: item.vector,
//!         })
//!         .collect();
//!     store.upsert("paper", entries).await?;
//!
//!     let query = batcher.embed_query("What scales linearly?").await?;
//!     for hit in store.query("paper", &query, 3).await? {
//!         println!("{:.3} {}", hit.score, hit.text);
//!     }
//!     Ok(())
//! }
//! ```

mod batcher;
mod embeddings;
mod error;
mod http;
mod index;
mod pairing;
mod store;
mod types;

pub use batcher::{BatchConfig, BatchFailure, BatchOutcome, EmbeddedBatch, EmbeddingBatcher};
pub use embeddings::{
    cosine_similarity, EmbeddingProvider, StubEmbedder, DEFAULT_EMBEDDING_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use index::CollectionIndex;
pub use pairing::{pair_embeddings, Paired};
pub use store::{LocalVectorStore, VectorStore};
pub use types::{CollectionSnapshot, EmbeddedChunk, QueryHit, StoredEntry};
