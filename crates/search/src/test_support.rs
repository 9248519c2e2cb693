use crate::error::Result;
use crate::synthesis::Synthesizer;
use async_trait::async_trait;
use scholar_vector_store::{
    BatchConfig, EmbeddingBatcher, EmbeddingProvider, StoredEntry, VectorStore,
};
use std::sync::{Arc, Mutex};

const KEYWORDS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

/// One axis per single-letter keyword appearing as a word in the text.
pub struct KeywordEmbedder;

pub fn keyword_vector(text: &str) -> Vec<f32> {
    KEYWORDS
        .iter()
        .map(|keyword| {
            let hit = text
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *keyword);
            if hit {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed(&self, texts: &[String]) -> scholar_vector_store::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

pub fn keyword_batcher() -> EmbeddingBatcher {
    EmbeddingBatcher::new(Arc::new(KeywordEmbedder), BatchConfig::default())
        .expect("default batch config is valid")
}

pub async fn seed_collection(store: &dyn VectorStore, name: &str, texts: &[&str]) {
    let entries = texts
        .iter()
        .enumerate()
        .map(|(i, text)| StoredEntry {
            id: format!("{name}-{i}"),
            text: (*text).to_string(),
            vector: keyword_vector(text),
        })
        .collect();
    store.upsert(name, entries).await.expect("seed upsert");
}

/// Records prompts and answers each with a fixed reply.
pub struct RecordingSynthesizer {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingSynthesizer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().expect("prompt log").push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
