use crate::error::{Result, SearchError};
use scholar_chunker::{Chunk, Chunker};
use scholar_vector_store::{EmbeddingBatcher, StoredEntry, VectorStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;

/// What happened to one document on its way into the vector store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub collection: String,
    pub chunks: usize,
    pub stored: usize,
    pub truncated: usize,
    pub unembeddable: usize,
    pub failed_batches: usize,
    pub mismatched_batches: usize,
    pub pairing_dropped: usize,
}

impl IngestReport {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.unembeddable > 0
            || self.failed_batches > 0
            || self.mismatched_batches > 0
            || self.pairing_dropped > 0
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: stored {}/{} chunks | truncated {} | unembeddable {} | failed batches {} | mismatched batches {}",
            self.collection,
            self.stored,
            self.chunks,
            self.truncated,
            self.unembeddable,
            self.failed_batches,
            self.mismatched_batches
        )
    }
}

/// Stable id for a stored chunk.
#[must_use]
pub fn chunk_id(collection: &str, sequence: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update([0]);
    hasher.update(sequence.to_le_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Chunk, embed and store documents.
#[derive(Clone)]
pub struct IngestPipeline {
    chunker: Chunker,
    batcher: EmbeddingBatcher,
    store: Arc<dyn VectorStore>,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(chunker: Chunker, batcher: EmbeddingBatcher, store: Arc<dyn VectorStore>) -> Self {
        Self {
            chunker,
            batcher,
            store,
        }
    }

    #[must_use]
    pub const fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    #[must_use]
    pub const fn batcher(&self) -> &EmbeddingBatcher {
        &self.batcher
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn chunk_document(&self, text: &str) -> Result<Vec<Chunk>> {
        Ok(self.chunker.chunk_document(text)?)
    }

    /// Chunk `text`, embed what fits the model input and upsert it into `collection`.
    ///
    /// Failed batches and dropped chunks degrade the report; only a document with nothing
    /// stored is an error.
    pub async fn embed_and_store(&self, text: &str, collection: &str) -> Result<IngestReport> {
        let chunks = self.chunk_document(text)?;
        let chunk_count = chunks.len();
        let pass = self.chunker.prepare_for_embedding(chunks)?;
        if pass.is_empty() {
            return Err(SearchError::NoValidChunks);
        }

        log::info!(
            "Embedding {} chunks into {} ({} truncated, {} unembeddable)",
            pass.chunks.len(),
            collection,
            pass.truncated,
            pass.dropped
        );

        let outcome = self.batcher.embed_texts(&pass.texts()).await?;
        let failed_batches = outcome.failures.len();
        let mismatched_batches = outcome.mismatched();
        let paired = outcome.into_pairs();
        if paired.items.is_empty() {
            return Err(SearchError::NothingEmbedded(collection.to_string()));
        }

        let entries: Vec<StoredEntry> = paired
            .items
            .into_iter()
            .enumerate()
            .map(|(sequence, item)| StoredEntry {
                id: chunk_id(collection, sequence, &item.text),
                text: item.text,
                vector: item.vector,
            })
            .collect();
        let stored = entries.len();
        self.store.upsert(collection, entries).await?;

        let report = IngestReport {
            collection: collection.to_string(),
            chunks: chunk_count,
            stored,
            truncated: pass.truncated,
            unembeddable: pass.dropped,
            failed_batches,
            mismatched_batches,
            pairing_dropped: paired.dropped,
        };
        if report.is_degraded() {
            log::warn!("Partial ingest: {report}");
        } else {
            log::info!("Stored {stored} chunks in {collection}");
        }
        Ok(report)
    }

    /// Ingest independent `(collection, text)` documents concurrently.
    ///
    /// Results come back in input order.
    pub async fn embed_many(&self, docs: Vec<(String, String)>) -> Vec<Result<IngestReport>> {
        let total = docs.len();
        let mut tasks = JoinSet::new();
        for (position, (collection, text)) in docs.into_iter().enumerate() {
            let pipeline = self.clone();
            tasks.spawn(async move {
                (position, pipeline.embed_and_store(&text, &collection).await)
            });
        }

        let mut results: Vec<Option<Result<IngestReport>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(err) => log::error!("Ingest task failed: {err}"),
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(SearchError::Other("ingest task aborted".to_string())))
            })
            .collect()
    }
}
