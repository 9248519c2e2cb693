use crate::error::{Result, SearchError};
use scholar_vector_store::{EmbeddingBatcher, VectorStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Separator between chunks in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits requested from each collection
    pub top_k: usize,
    /// Global cap on chunks after deduplication
    pub max_context_chunks: usize,
    /// Characters kept per chunk before the truncation marker
    pub max_chunk_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_context_chunks: 50,
            max_chunk_chars: 1500,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        if self.max_context_chunks == 0 {
            return Err("max_context_chunks must be at least 1".to_string());
        }
        if self.max_chunk_chars == 0 {
            return Err("max_chunk_chars must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub collection: String,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub context: String,
    pub sources: Vec<SourceChunk>,
    pub duplicates_removed: usize,
    /// Unique chunks cut by `max_context_chunks`
    pub capped: usize,
}

impl RetrievalContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Cut `text` to `max_chars` characters plus `"..."`; returns whether it was cut.
#[must_use]
pub fn trim_chunk(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]), true),
        None => (text.to_string(), false),
    }
}

/// Deduplicate `(collection, text)` candidates by text (first seen wins), apply the chunk
/// cap, trim each survivor and join them.
#[must_use]
pub fn assemble_context<I>(candidates: I, config: &RetrievalConfig) -> RetrievalContext
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut duplicates_removed = 0;
    for (collection, text) in candidates {
        if seen.insert(text.clone()) {
            unique.push((collection, text));
        } else {
            duplicates_removed += 1;
        }
    }

    let capped = unique.len().saturating_sub(config.max_context_chunks);
    unique.truncate(config.max_context_chunks);

    let sources: Vec<SourceChunk> = unique
        .into_iter()
        .map(|(collection, text)| {
            let (text, truncated) = trim_chunk(&text, config.max_chunk_chars);
            SourceChunk {
                collection,
                text,
                truncated,
            }
        })
        .collect();
    let context = sources
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    RetrievalContext {
        context,
        sources,
        duplicates_removed,
        capped,
    }
}

/// Multi-collection retrieval for one question.
#[derive(Clone)]
pub struct RetrievalAggregator {
    batcher: EmbeddingBatcher,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl RetrievalAggregator {
    pub fn new(
        batcher: EmbeddingBatcher,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate().map_err(SearchError::InvalidRequest)?;
        Ok(Self {
            batcher,
            store,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed `question` once, query every collection in order and assemble the context.
    ///
    /// Any failing collection query fails the whole request.
    pub async fn build_retrieval_context(
        &self,
        question: &str,
        collections: &[String],
    ) -> Result<RetrievalContext> {
        if question.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if collections.is_empty() {
            return Err(SearchError::NoCollections);
        }

        let query = self.batcher.embed_query(question).await?;

        let mut candidates = Vec::new();
        for name in collections {
            let hits = self
                .store
                .query(name, &query, self.config.top_k)
                .await
                .map_err(|e| {
                    log::error!("Query against collection {name} failed: {e}");
                    e
                })?;
            log::debug!("Collection {name}: {} hits", hits.len());
            candidates.extend(hits.into_iter().map(|hit| (name.clone(), hit.text)));
        }

        let context = assemble_context(candidates, &self.config);
        if context.is_empty() {
            return Err(SearchError::NoContext(collections.join(", ")));
        }

        log::info!(
            "Retrieved {} chunks from {} collections ({} duplicates removed, {} capped)",
            context.sources.len(),
            collections.len(),
            context.duplicates_removed,
            context.capped
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{keyword_batcher, seed_collection};
    use pretty_assertions::assert_eq;
    use scholar_vector_store::LocalVectorStore;

    fn candidates(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(c, t)| ((*c).to_string(), (*t).to_string()))
            .collect()
    }

    #[test]
    fn deduplicates_in_first_seen_order() {
        let ctx = assemble_context(
            candidates(&[("one", "A"), ("one", "B"), ("two", "A"), ("two", "C")]),
            &RetrievalConfig::default(),
        );

        let texts: Vec<_> = ctx.sources.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(ctx.sources[2].collection, "two");
        assert_eq!(ctx.duplicates_removed, 1);
        assert_eq!(ctx.context, "A\n\n---\n\nB\n\n---\n\nC");
    }

    #[test]
    fn long_chunks_are_trimmed_with_marker() {
        let long = "x".repeat(2000);
        let (trimmed, truncated) = trim_chunk(&long, 1500);
        assert!(truncated);
        assert_eq!(trimmed.chars().count(), 1503);
        assert!(trimmed.ends_with("..."));

        let (exact, truncated) = trim_chunk(&"y".repeat(1500), 1500);
        assert!(!truncated);
        assert_eq!(exact.len(), 1500);
    }

    #[test]
    fn trimming_counts_characters_not_bytes() {
        let (trimmed, truncated) = trim_chunk("ééééé", 3);
        assert!(truncated);
        assert_eq!(trimmed, "ééé...");
    }

    #[test]
    fn caps_total_chunks() {
        let config = RetrievalConfig {
            max_context_chunks: 2,
            ..RetrievalConfig::default()
        };
        let ctx = assemble_context(
            candidates(&[("a", "1"), ("a", "2"), ("a", "3"), ("a", "1")]),
            &config,
        );
        assert_eq!(ctx.sources.len(), 2);
        assert_eq!(ctx.capped, 1);
        assert_eq!(ctx.duplicates_removed, 1);
    }

    #[tokio::test]
    async fn queries_collections_in_order_and_dedups() {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        seed_collection(&*store, "one", &["A", "B"]).await;
        seed_collection(&*store, "two", &["A", "C"]).await;
        let aggregator =
            RetrievalAggregator::new(keyword_batcher(), store, RetrievalConfig::default()).unwrap();

        let ctx = aggregator
            .build_retrieval_context("A question", &["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        let texts: Vec<_> = ctx.sources.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(ctx.duplicates_removed, 1);
    }

    #[tokio::test]
    async fn rejects_empty_requests() {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        let aggregator =
            RetrievalAggregator::new(keyword_batcher(), store, RetrievalConfig::default()).unwrap();

        let err = aggregator
            .build_retrieval_context("  ", &["one".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));

        let err = aggregator
            .build_retrieval_context("A question", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoCollections));
    }

    #[tokio::test]
    async fn unknown_collection_aborts_request() {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        seed_collection(&*store, "one", &["A"]).await;
        let aggregator =
            RetrievalAggregator::new(keyword_batcher(), store, RetrievalConfig::default()).unwrap();

        let err = aggregator
            .build_retrieval_context("A question", &["one".to_string(), "missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::VectorStoreError(_)));
    }
}
