use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::sentences::split_sentences;
use crate::tokenizer::TextTokenizer;
use crate::types::{Chunk, EmbeddingPass};
use serde::Serialize;

/// Main chunker interface for processing documents
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    tokenizer: TextTokenizer,
    instruction_tokens: usize,
}

impl Chunker {
    /// Create a new chunker; fails on invalid configuration
    pub fn new(config: ChunkerConfig, tokenizer: TextTokenizer) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;

        let tokenizer = tokenizer.with_truncate_step(config.truncate_step);
        let instruction_tokens = tokenizer.token_count(&config.instruction)?;
        if instruction_tokens >= config.embed_token_budget {
            return Err(ChunkerError::invalid_config(format!(
                "instruction uses {instruction_tokens} tokens, embed_token_budget is {}",
                config.embed_token_budget
            )));
        }

        Ok(Self {
            config,
            tokenizer,
            instruction_tokens,
        })
    }

    /// Chunker backed by the built-in lexical tokenizer
    pub fn lexical(config: ChunkerConfig) -> Result<Self> {
        Self::new(config, TextTokenizer::lexical())
    }

    /// Split a document into ordered, sentence-aligned chunks.
    ///
    /// Sentences are accumulated greedily up to `max_tokens`. When the next sentence does
    /// not fit, the chunk is emitted and the next one is seeded with the longest run of
    /// trailing sentences that fits in `overlap_tokens`. A sentence that alone exceeds
    /// `max_tokens` becomes its own chunk; sentences are never split.
    pub fn chunk_document(&self, text: &str) -> Result<Vec<Chunk>> {
        let sentences = split_sentences(text);
        let counts = sentences
            .iter()
            .map(|sentence| self.tokenizer.token_count(sentence))
            .collect::<Result<Vec<_>>>()?;

        let max_tokens = self.config.max_tokens;
        let mut chunks = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_tokens = 0usize;
        let mut overlap = 0usize;

        for (idx, &tokens) in counts.iter().enumerate() {
            if !current.is_empty() && current_tokens + tokens > max_tokens {
                chunks.push(self.emit(&sentences, &current, overlap, chunks.len())?);

                let mut seed = select_overlap(&current, &counts, self.config.overlap_tokens);
                let mut seed_tokens: usize = seed.iter().map(|&i| counts[i]).sum();
                // Keep the invariant for multi-sentence chunks: shed the oldest carried
                // sentence until the incoming one fits.
                while !seed.is_empty() && seed_tokens + tokens > max_tokens {
                    seed_tokens -= counts[seed.remove(0)];
                }

                overlap = seed.len();
                current = seed;
                current_tokens = seed_tokens;
            }

            current.push(idx);
            current_tokens += tokens;
        }

        if !current.is_empty() {
            chunks.push(self.emit(&sentences, &current, overlap, chunks.len())?);
        }

        log::debug!(
            "Text split into {} chunks (max_tokens={}, overlap={})",
            chunks.len(),
            max_tokens,
            self.config.overlap_tokens
        );

        Ok(chunks)
    }

    /// Re-check chunks against the embedding input budget (instruction + chunk).
    ///
    /// Over-budget chunks are truncated from the end in fixed steps; chunks that end up
    /// empty are dropped with a warning instead of failing the document.
    pub fn prepare_for_embedding(&self, chunks: Vec<Chunk>) -> Result<EmbeddingPass> {
        let budget = self.config.embed_token_budget;
        let chunk_budget = budget - self.instruction_tokens;
        let mut pass = EmbeddingPass {
            chunks: Vec::with_capacity(chunks.len()),
            ..Default::default()
        };

        for mut chunk in chunks {
            if self.instruction_tokens + chunk.token_count <= budget {
                pass.chunks.push(chunk);
                continue;
            }

            let truncated = self.tokenizer.truncate_to(&chunk.text, chunk_budget)?;
            if truncated.trim().is_empty() {
                log::warn!(
                    "Skipping chunk {} ({} tokens): exceeds the embedding budget even after truncation",
                    chunk.sequence_index,
                    chunk.token_count
                );
                pass.dropped += 1;
                continue;
            }

            chunk.token_count = self.tokenizer.token_count(&truncated)?;
            chunk.text = truncated;
            pass.truncated += 1;
            pass.chunks.push(chunk);
        }

        if pass.truncated > 0 || pass.dropped > 0 {
            log::debug!(
                "Embedding pass: {} kept, {} truncated, {} dropped",
                pass.chunks.len(),
                pass.truncated,
                pass.dropped
            );
        }

        Ok(pass)
    }

    /// `chunk_document` followed by `prepare_for_embedding`
    pub fn chunk_for_embedding(&self, text: &str) -> Result<EmbeddingPass> {
        let chunks = self.chunk_document(text)?;
        self.prepare_for_embedding(chunks)
    }

    fn emit(
        &self,
        sentences: &[String],
        indices: &[usize],
        overlap: usize,
        sequence_index: usize,
    ) -> Result<Chunk> {
        let text = indices
            .iter()
            .map(|&i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let token_count = self.tokenizer.token_count(&text)?;
        Ok(Chunk::new(
            text,
            sequence_index,
            token_count,
            indices.len(),
            overlap,
        ))
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    #[must_use]
    pub const fn tokenizer(&self) -> &TextTokenizer {
        &self.tokenizer
    }

    /// Tokens consumed by the embedding instruction
    #[must_use]
    pub const fn instruction_tokens(&self) -> usize {
        self.instruction_tokens
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(chunks: &[Chunk], max_tokens: usize) -> ChunkingStats {
        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_tokens,
            avg_tokens_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_tokens / chunks.len()
            },
            min_tokens: chunks.iter().map(|c| c.token_count).min().unwrap_or(0),
            max_tokens: chunks.iter().map(|c| c.token_count).max().unwrap_or(0),
            oversized: chunks.iter().filter(|c| c.is_oversized(max_tokens)).count(),
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub oversized: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Tokens: {} | Avg: {} | Range: {}-{} | Oversized: {}",
            self.total_chunks,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.oversized
        )
    }
}

/// Longest suffix of `indices` whose summed token count fits in `budget`.
fn select_overlap(indices: &[usize], counts: &[usize], budget: usize) -> Vec<usize> {
    if budget == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut total = 0usize;
    for &idx in indices.iter().rev() {
        let tokens = counts[idx];
        if total + tokens > budget {
            break;
        }
        total += tokens;
        out.push(idx);
    }

    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Sentence with exactly five lexical tokens: "S{n}", "a", "b", "c", "."
    fn sentence(n: usize) -> String {
        format!("S{n} a b c.")
    }

    fn doc(count: usize) -> String {
        (0..count).map(sentence).collect::<Vec<_>>().join(" ")
    }

    fn chunker(max_tokens: usize, overlap_tokens: usize) -> Chunker {
        Chunker::lexical(ChunkerConfig::default().with_budget(max_tokens, overlap_tokens)).unwrap()
    }

    #[test]
    fn three_sentences_fit_in_one_chunk() {
        let text = "Transformers replace recurrence. Attention is computed in parallel. \
                    Training is faster.";
        let chunks = chunker(500, 50).chunk_document(text).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "Transformers replace recurrence. Attention is computed in parallel. Training is faster."
        );
        assert_eq!(chunks[0].sentence_count, 3);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn overflow_seeds_next_chunk_with_trailing_sentences() {
        let chunks = chunker(12, 5).chunk_document(&doc(6)).unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "S0 a b c. S1 a b c.",
                "S1 a b c. S2 a b c.",
                "S2 a b c. S3 a b c.",
                "S3 a b c. S4 a b c.",
                "S4 a b c. S5 a b c.",
            ]
        );
        assert_eq!(chunks[0].overlap_sentences, 0);
        assert!(chunks[1..].iter().all(|c| c.overlap_sentences == 1));
        assert!(chunks.iter().all(|c| c.token_count <= 12));
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let chunks = chunker(12, 0).chunk_document(&doc(6)).unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "S0 a b c. S1 a b c.",
                "S2 a b c. S3 a b c.",
                "S4 a b c. S5 a b c.",
            ]
        );
    }

    #[test]
    fn overlap_seed_is_trimmed_to_keep_chunks_in_budget() {
        // Two carried sentences (10 tokens) plus the next one would be 15 > 12.
        let chunks = chunker(12, 10).chunk_document(&doc(4)).unwrap();

        assert!(chunks.iter().all(|c| c.token_count <= 12));
        assert_eq!(chunks[1].text, "S1 a b c. S2 a b c.");
        assert_eq!(chunks[1].overlap_sentences, 1);
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let long = format!("Long {} end.", vec!["word"; 20].join(" "));
        let text = format!("{} {long} {}", sentence(0), sentence(1));
        let chunks = chunker(12, 5).chunk_document(&text).unwrap();

        let oversized: Vec<&Chunk> = chunks.iter().filter(|c| c.is_oversized(12)).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].text, long);
        assert_eq!(oversized[0].sentence_count, 1);
        assert_eq!(chunks.last().unwrap().text, sentence(1));
    }

    #[test]
    fn chunking_is_idempotent() {
        let chunker = chunker(17, 6);
        let text = doc(23);
        assert_eq!(
            chunker.chunk_document(&text).unwrap(),
            chunker.chunk_document(&text).unwrap()
        );
    }

    #[test]
    fn blank_document_has_no_chunks() {
        assert!(chunker(12, 5).chunk_document("  \n ").unwrap().is_empty());
    }

    #[test]
    fn embedding_pass_truncates_over_budget_chunks() {
        let config = ChunkerConfig {
            max_tokens: 100,
            overlap_tokens: 0,
            embed_token_budget: 12,
            instruction: "Embed this".to_string(),
            truncate_step: 3,
        };
        let chunker = Chunker::lexical(config).unwrap();
        assert_eq!(chunker.instruction_tokens(), 2);

        let text = format!("{}.", (0..19).map(|i| format!("t{i}")).collect::<Vec<_>>().join(" "));
        let pass = chunker.chunk_for_embedding(&text).unwrap();

        assert_eq!(pass.truncated, 1);
        assert_eq!(pass.dropped, 0);
        // 20 -> 17 -> 14 -> 11 -> 8 tokens
        assert_eq!(pass.chunks[0].token_count, 8);
        assert_eq!(pass.chunks[0].text, "t0 t1 t2 t3 t4 t5 t6 t7");
    }

    #[test]
    fn embedding_pass_drops_unembeddable_chunks() {
        let config = ChunkerConfig {
            max_tokens: 100,
            overlap_tokens: 0,
            embed_token_budget: 7,
            instruction: "Embed this".to_string(),
            truncate_step: 10,
        };
        let chunker = Chunker::lexical(config).unwrap();
        let chunks = vec![
            Chunk::new("a b c d e f g h".to_string(), 0, 8, 1, 0),
            Chunk::new("short one".to_string(), 1, 2, 1, 0),
        ];

        let pass = chunker.prepare_for_embedding(chunks).unwrap();

        assert_eq!(pass.dropped, 1);
        assert_eq!(pass.truncated, 0);
        assert_eq!(pass.texts(), vec!["short one".to_string()]);
        assert_eq!(pass.chunks[0].sequence_index, 1);
    }

    #[test]
    fn instruction_larger_than_budget_is_rejected() {
        let config = ChunkerConfig {
            embed_token_budget: 3,
            max_tokens: 10,
            overlap_tokens: 0,
            ..Default::default()
        };
        let err = Chunker::lexical(config).unwrap_err();
        assert!(matches!(err, ChunkerError::InvalidConfig(_)));
    }

    #[test]
    fn test_chunking_stats() {
        let chunks = chunker(12, 5).chunk_document(&doc(6)).unwrap();
        let stats = Chunker::get_stats(&chunks, 12);

        assert_eq!(stats.total_chunks, 5);
        assert_eq!(stats.total_tokens, 50);
        assert_eq!(stats.avg_tokens_per_chunk, 10);
        assert_eq!(stats.oversized, 0);
        assert!(stats.to_string().starts_with("Chunks: 5"));
    }
}
