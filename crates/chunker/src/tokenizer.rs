use crate::error::{ChunkerError, Result};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

/// Default number of tokens dropped per truncation round.
pub const DEFAULT_TRUNCATE_STEP: usize = 10;

/// Token counting and truncation over a fixed vocabulary.
///
/// Tokens are reported as byte spans into the encoded text, so decoding a prefix is a
/// slice of the source rather than a lossy round-trip through token ids.
#[derive(Clone)]
pub struct TextTokenizer {
    backend: TokenizerBackend,
    truncate_step: usize,
}

#[derive(Clone)]
enum TokenizerBackend {
    /// HuggingFace tokenizer loaded from `tokenizer.json`
    Hf(Arc<Tokenizer>),
    /// Every non-whitespace Unicode word-boundary segment is one token
    Lexical,
}

impl TextTokenizer {
    /// Built-in tokenizer that needs no vocabulary file.
    #[must_use]
    pub const fn lexical() -> Self {
        Self {
            backend: TokenizerBackend::Lexical,
            truncate_step: DEFAULT_TRUNCATE_STEP,
        }
    }

    /// Load a HuggingFace `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ChunkerError::tokenizer(format!("Tokenizer load failed for {}: {e}", path.display()))
        })?;
        log::info!("Loaded tokenizer from {}", path.display());
        Ok(Self {
            backend: TokenizerBackend::Hf(Arc::new(tokenizer)),
            truncate_step: DEFAULT_TRUNCATE_STEP,
        })
    }

    /// Load from `path` when given, otherwise fall back to the lexical tokenizer.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::lexical()),
        }
    }

    /// Builder: set the truncation decrement
    #[must_use]
    pub fn with_truncate_step(mut self, step: usize) -> Self {
        self.truncate_step = step.max(1);
        self
    }

    #[must_use]
    pub const fn truncate_step(&self) -> usize {
        self.truncate_step
    }

    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            TokenizerBackend::Hf(_) => "huggingface",
            TokenizerBackend::Lexical => "lexical",
        }
    }

    /// Encode `text` into token byte spans (in token order).
    pub fn encode(&self, text: &str) -> Result<Vec<Range<usize>>> {
        match &self.backend {
            TokenizerBackend::Lexical => Ok(text
                .split_word_bound_indices()
                .filter(|(_, segment)| segment.chars().any(|c| !c.is_whitespace()))
                .map(|(start, segment)| start..start + segment.len())
                .collect()),
            TokenizerBackend::Hf(tokenizer) => {
                let encoding = tokenizer
                    .encode(text, false)
                    .map_err(|e| ChunkerError::tokenizer(format!("Encoding failed: {e}")))?;
                Ok(encoding
                    .get_offsets()
                    .iter()
                    .map(|&(start, end)| start..end)
                    .collect())
            }
        }
    }

    /// Text covered by `spans`, from the first span start to the furthest span end.
    #[must_use]
    pub fn decode(&self, text: &str, spans: &[Range<usize>]) -> String {
        let Some(start) = spans.iter().map(|span| span.start).min() else {
            return String::new();
        };
        let end = spans.iter().map(|span| span.end).max().unwrap_or(start);
        let start = floor_char_boundary(text, start);
        let end = floor_char_boundary(text, end);
        if end <= start {
            return String::new();
        }
        text[start..end].to_string()
    }

    pub fn token_count(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        match &self.backend {
            TokenizerBackend::Lexical => Ok(text
                .split_word_bounds()
                .filter(|segment| segment.chars().any(|c| !c.is_whitespace()))
                .count()),
            TokenizerBackend::Hf(_) => Ok(self.encode(text)?.len()),
        }
    }

    /// Drop tokens from the end, `truncate_step` at a time, until `text` fits in `max_tokens`.
    ///
    /// Returns an empty string when the text is still over budget with no more than one
    /// step's worth of tokens left: such a fragment is treated as unembeddable.
    pub fn truncate_to(&self, text: &str, max_tokens: usize) -> Result<String> {
        let mut current = text.to_string();
        loop {
            let spans = self.encode(&current)?;
            if spans.len() <= max_tokens {
                return Ok(current);
            }
            if spans.len() <= self.truncate_step {
                return Ok(String::new());
            }

            let keep = spans.len() - self.truncate_step;
            let cut = spans[..keep]
                .iter()
                .map(|span| span.end)
                .max()
                .map_or(0, |end| floor_char_boundary(&current, end));
            if cut == 0 || cut >= current.len() {
                // No forward progress possible with this vocabulary.
                return Ok(String::new());
            }
            current.truncate(cut);
        }
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::lexical()
    }
}

impl std::fmt::Debug for TextTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTokenizer")
            .field("backend", &self.backend_name())
            .field("truncate_step", &self.truncate_step)
            .finish()
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
