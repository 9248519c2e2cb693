use serde::{Deserialize, Serialize};

/// Chunk text paired with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub text: String,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            vector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// One ranked result of a collection query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Everything stored in one collection, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl CollectionSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn into_embedded(self) -> Vec<EmbeddedChunk> {
        self.texts
            .into_iter()
            .zip(self.vectors)
            .map(|(text, vector)| EmbeddedChunk { text, vector })
            .collect()
    }
}
