use serde::{Deserialize, Serialize};

/// Instruction the embedding request is budgeted against.
pub const DEFAULT_EMBED_INSTRUCTION: &str =
    "Represent the scientific research paper chunk for semantic retrieval";

/// Configuration for document chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk size in tokens (hard limit, except single oversized sentences)
    pub max_tokens: usize,

    /// Budget for whole sentences repeated at the start of the next chunk
    pub overlap_tokens: usize,

    /// Total token budget of one embedding input (instruction + chunk)
    pub embed_token_budget: usize,

    /// Instruction string prepended to every embedded chunk
    pub instruction: String,

    /// Number of tokens removed per truncation step
    pub truncate_step: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            overlap_tokens: 100,
            embed_token_budget: 512,
            instruction: DEFAULT_EMBED_INSTRUCTION.to_string(),
            truncate_step: 10,
        }
    }
}

impl ChunkerConfig {
    /// Create config sized for the embedding model input window
    pub fn for_embeddings() -> Self {
        Self {
            max_tokens: 480,
            overlap_tokens: 50,
            ..Default::default()
        }
    }

    /// Create config for per-chunk LLM summarization (larger chunks, wider overlap)
    pub fn for_summaries() -> Self {
        Self {
            max_tokens: 1500,
            overlap_tokens: 150,
            ..Default::default()
        }
    }

    /// Builder: override the token budgets
    #[must_use]
    pub const fn with_budget(mut self, max_tokens: usize, overlap_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self.overlap_tokens = overlap_tokens;
        self
    }

    /// Validate configuration.
    ///
    /// Instruction-vs-budget is checked by [`crate::Chunker::new`] because it needs the tokenizer.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be > 0".to_string());
        }

        if self.overlap_tokens >= self.max_tokens {
            return Err(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            ));
        }

        if self.truncate_step == 0 {
            return Err("truncate_step must be > 0".to_string());
        }

        if self.embed_token_budget == 0 {
            return Err("embed_token_budget must be > 0".to_string());
        }

        Ok(())
    }
}
