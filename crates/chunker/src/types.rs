use serde::{Deserialize, Serialize};

/// A token-budgeted span of whole sentences from a source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Sentences joined by a single space
    pub text: String,

    /// Position of this chunk in the source document (0-indexed)
    pub sequence_index: usize,

    /// Token count of `text` under the chunker's tokenizer
    pub token_count: usize,

    /// Number of sentences in this chunk
    pub sentence_count: usize,

    /// Leading sentences repeated from the previous chunk
    #[serde(default)]
    pub overlap_sentences: usize,
}

impl Chunk {
    /// Create a new chunk
    #[must_use]
    pub const fn new(
        text: String,
        sequence_index: usize,
        token_count: usize,
        sentence_count: usize,
        overlap_sentences: usize,
    ) -> Self {
        Self {
            text,
            sequence_index,
            token_count,
            sentence_count,
            overlap_sentences,
        }
    }

    /// A chunk over `max_tokens` is only legal when it holds a single sentence.
    #[must_use]
    pub const fn is_oversized(&self, max_tokens: usize) -> bool {
        self.token_count > max_tokens
    }
}

/// Chunks that survived the embedding budget check, plus what it cost
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingPass {
    pub chunks: Vec<Chunk>,

    /// Chunks shortened to fit the budget
    pub truncated: usize,

    /// Chunks that could not be reduced to a useful size and were removed
    pub dropped: usize,
}

impl EmbeddingPass {
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|chunk| chunk.text.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
