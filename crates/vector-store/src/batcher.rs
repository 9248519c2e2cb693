//! Sequential batched embedding with bounded retry and partial-failure tolerance.

use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, VectorStoreError};
use crate::pairing::{pair_embeddings, Paired};
use crate::types::EmbeddedChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Texts per provider request
    pub batch_size: usize,
    /// Attempts per batch, first try included
    pub max_attempts: u32,
    /// Sleep before retry `n` is `backoff_base_ms * n`
    pub backoff_base_ms: u64,
    /// Prepended to every document text as `"{instruction}\n{text}"`
    pub instruction: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 12,
            max_attempts: 3,
            backoff_base_ms: 1500,
            instruction: None,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(attempt)))
    }
}

/// A batch the provider answered, with the texts it was asked about.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedBatch {
    pub index: usize,
    pub texts: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddedBatch {
    #[must_use]
    pub fn is_mismatched(&self) -> bool {
        self.texts.len() != self.vectors.len()
    }
}

/// A batch omitted from the outcome after its attempts ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub size: usize,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub batches: Vec<EmbeddedBatch>,
    pub failures: Vec<BatchFailure>,
    pub skipped_blank: usize,
}

impl BatchOutcome {
    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.batches.iter().map(|b| b.vectors.len()).sum()
    }

    #[must_use]
    pub fn mismatched(&self) -> usize {
        self.batches.iter().filter(|b| b.is_mismatched()).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.mismatched() == 0
    }

    /// Pairs texts with vectors batch by batch.
    #[must_use]
    pub fn into_pairs(self) -> Paired {
        let mut items: Vec<EmbeddedChunk> = Vec::new();
        let mut dropped = 0;
        for batch in self.batches {
            let paired = pair_embeddings(batch.texts, batch.vectors);
            items.extend(paired.items);
            dropped += paired.dropped;
        }
        Paired { items, dropped }
    }
}

/// Drives an [`EmbeddingProvider`] over arbitrarily many texts.
#[derive(Clone)]
pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    config: BatchConfig,
}

impl std::fmt::Debug for EmbeddingBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingBatcher")
            .field("model", &self.provider.model_id())
            .field("config", &self.config)
            .finish()
    }
}

impl EmbeddingBatcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: BatchConfig) -> Result<Self> {
        config.validate().map_err(VectorStoreError::Other)?;
        Ok(Self { provider, config })
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Embed document texts.
    ///
    /// Blank texts are skipped and the rest trimmed. Batches run one after another; a
    /// batch that keeps failing is logged and left out, the remaining batches still run.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<BatchOutcome> {
        let cleaned: Vec<String> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let skipped_blank = texts.len() - cleaned.len();

        if cleaned.is_empty() {
            return Err(VectorStoreError::EmptyInput(
                "no non-blank texts to embed".to_string(),
            ));
        }
        if skipped_blank > 0 {
            log::debug!("Skipped {skipped_blank} blank texts before embedding");
        }

        let total_batches = cleaned.len().div_ceil(self.config.batch_size);
        let mut outcome = BatchOutcome {
            skipped_blank,
            ..BatchOutcome::default()
        };

        for (index, batch) in cleaned.chunks(self.config.batch_size).enumerate() {
            let request: Vec<String> = match self.config.instruction.as_deref() {
                Some(instruction) => batch
                    .iter()
                    .map(|text| format!("{instruction}\n{text}"))
                    .collect(),
                None => batch.to_vec(),
            };

            log::debug!(
                "Embedding batch {}/{} ({} texts)",
                index + 1,
                total_batches,
                batch.len()
            );

            match self.send_with_retry(&request).await {
                Ok(vectors) => {
                    if vectors.len() != batch.len() {
                        log::warn!(
                            "Batch {}: sent {} texts but received {} embeddings",
                            index + 1,
                            batch.len(),
                            vectors.len()
                        );
                    }
                    outcome.batches.push(EmbeddedBatch {
                        index,
                        texts: batch.to_vec(),
                        vectors,
                    });
                }
                Err((attempts, err)) => {
                    log::error!(
                        "Batch {}/{} failed after {} attempt(s): {}",
                        index + 1,
                        total_batches,
                        attempts,
                        err
                    );
                    outcome.failures.push(BatchFailure {
                        index,
                        size: batch.len(),
                        attempts,
                        error: err.to_string(),
                    });
                }
            }
        }

        if !outcome.is_complete() {
            log::warn!(
                "Embedded {} of {} texts; {} batch(es) failed, {} mismatched",
                outcome.vector_count(),
                cleaned.len(),
                outcome.failures.len(),
                outcome.mismatched()
            );
        }

        Ok(outcome)
    }

    /// Embed a single question without the document instruction.
    pub async fn embed_query(&self, question: &str) -> Result<Vec<f32>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(VectorStoreError::EmptyInput("empty query".to_string()));
        }

        let vectors = self
            .send_with_retry(&[question.to_string()])
            .await
            .map_err(|(_, err)| err)?;
        vectors.into_iter().next().ok_or_else(|| {
            VectorStoreError::EmbeddingError("provider returned no query embedding".to_string())
        })
    }

    async fn send_with_retry(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, (u32, VectorStoreError)> {
        let mut attempt = 1;
        loop {
            match self.provider.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff(attempt);
                    log::warn!(
                        "Embedding attempt {attempt}/{} failed: {err}; retrying in {delay:?}",
                        self.config.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err((attempt, err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::StubEmbedder;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Fails every request containing the poison text.
    struct PoisonedProvider {
        poison: String,
        status: u16,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for PoisonedProvider {
        fn model_id(&self) -> &str {
            "poisoned"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push(texts.len());
            if texts.iter().any(|t| t.contains(&self.poison)) {
                return Err(VectorStoreError::Provider {
                    status: self.status,
                    body: "nope".to_string(),
                });
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
    }

    /// Replays scripted responses in order.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Vec<Vec<f32>>>>>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Vec<Vec<f32>>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn model_id(&self) -> &str {
            "scripted"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.lock().unwrap().push(texts.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect()))
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk {i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_middle_batch_is_omitted() {
        let provider = Arc::new(PoisonedProvider {
            poison: "chunk 15".to_string(),
            status: 503,
            calls: Mutex::new(Vec::new()),
        });
        let batcher = EmbeddingBatcher::new(provider.clone(), BatchConfig::default()).unwrap();

        let outcome = batcher.embed_texts(&texts(30)).await.unwrap();

        assert_eq!(outcome.vector_count(), 18);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(outcome.failures[0].attempts, 3);
        // batch 0, batch 1 three times, batch 2
        assert_eq!(*provider.calls.lock().unwrap(), vec![12, 12, 12, 12, 6]);

        let paired = outcome.into_pairs();
        assert_eq!(paired.items.len(), 18);
        assert_eq!(paired.items[12].text, "chunk 24");
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_is_not_retried() {
        let provider = Arc::new(PoisonedProvider {
            poison: "chunk 0".to_string(),
            status: 401,
            calls: Mutex::new(Vec::new()),
        });
        let batcher = EmbeddingBatcher::new(provider.clone(), BatchConfig::default()).unwrap();

        let outcome = batcher.embed_texts(&texts(3)).await.unwrap();

        assert_eq!(outcome.vector_count(), 0);
        assert_eq!(outcome.failures[0].attempts, 1);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_backs_off_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(VectorStoreError::Provider {
                status: 429,
                body: "rate limited".to_string(),
            }),
            Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
        ]));
        let batcher = EmbeddingBatcher::new(provider.clone(), BatchConfig::default()).unwrap();

        let started = tokio::time::Instant::now();
        let outcome = batcher.embed_texts(&texts(2)).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.vector_count(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(provider.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn short_response_is_kept_and_flagged() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![vec![1.0, 0.0]])]));
        let batcher = EmbeddingBatcher::new(provider, BatchConfig::default()).unwrap();

        let outcome = batcher.embed_texts(&texts(3)).await.unwrap();

        assert_eq!(outcome.mismatched(), 1);
        let paired = outcome.into_pairs();
        assert_eq!(paired.items.len(), 1);
        assert_eq!(paired.dropped, 2);
        assert_eq!(paired.items[0].text, "chunk 0");
    }

    #[tokio::test]
    async fn blank_texts_are_skipped_and_all_blank_is_an_error() {
        let batcher =
            EmbeddingBatcher::new(Arc::new(StubEmbedder::new(8)), BatchConfig::default()).unwrap();

        let input = vec!["  ".to_string(), " alpha ".to_string(), String::new()];
        let outcome = batcher.embed_texts(&input).await.unwrap();
        assert_eq!(outcome.skipped_blank, 2);
        assert_eq!(outcome.batches[0].texts, vec!["alpha".to_string()]);

        let err = batcher
            .embed_texts(&["\n".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn instruction_prefixes_documents_but_not_queries() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let config = BatchConfig {
            instruction: Some("Represent this".to_string()),
            ..BatchConfig::default()
        };
        let batcher = EmbeddingBatcher::new(provider.clone(), config).unwrap();

        batcher.embed_texts(&["doc".to_string()]).await.unwrap();
        batcher.embed_query("  what is new?  ").await.unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0], vec!["Represent this\ndoc".to_string()]);
        assert_eq!(seen[1], vec!["what is new?".to_string()]);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = BatchConfig {
            batch_size: 0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(BatchConfig::default().backoff(2), Duration::from_millis(3000));
    }
}
