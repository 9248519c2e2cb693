use crate::flags::EmbedMode;
use anyhow::{bail, Context, Result};
use scholar_chunker::ChunkerConfig;
use scholar_search::{ChatConfig, RetrievalConfig, DEFAULT_NOVELTY_THRESHOLD};
use scholar_vector_store::{BatchConfig, HttpEmbedderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub(crate) const API_KEY_ENV: &str = "MISTRAL_API_KEY";
pub(crate) const EMBEDDING_MODE_ENV: &str = "SCHOLAR_EMBEDDING_MODE";
pub(crate) const DATA_DIR_ENV: &str = "SCHOLAR_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EmbeddingSettings {
    pub mode: EmbedMode,
    /// Send `"{instruction}\n{chunk}"` instead of the bare chunk
    pub prefix_instruction: bool,
    #[serde(flatten)]
    pub http: HttpEmbedderConfig,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            mode: EmbedMode::Http,
            prefix_instruction: false,
            http: HttpEmbedderConfig::default(),
        }
    }
}

/// Settings read from `scholar.toml`, then the environment, then flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub data_dir: PathBuf,
    /// HuggingFace `tokenizer.json`; the built-in lexical tokenizer is used when unset
    pub tokenizer_path: Option<PathBuf>,
    pub novelty_threshold: f32,
    pub chunking: ChunkerConfig,
    pub embedding: EmbeddingSettings,
    pub batch: BatchConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".scholar"),
            tokenizer_path: None,
            novelty_threshold: DEFAULT_NOVELTY_THRESHOLD,
            chunking: ChunkerConfig::for_embeddings(),
            embedding: EmbeddingSettings::default(),
            batch: BatchConfig::default(),
            retrieval: RetrievalConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse `path` when given; a missing file is an error, no file means defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub(crate) fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            if self.embedding.http.api_key.is_empty() {
                self.embedding.http.api_key = key.clone();
            }
            if self.chat.api_key.is_empty() {
                self.chat.api_key = key;
            }
        }
        if let Some(raw) = lookup(EMBEDDING_MODE_ENV) {
            self.embedding.mode = EmbedMode::parse(&raw)
                .with_context(|| format!("{EMBEDDING_MODE_ENV} has unknown value {raw:?}"))?;
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Err(err) = self.chunking.validate() {
            bail!("chunking: {err}");
        }
        if let Err(err) = self.batch.validate() {
            bail!("batch: {err}");
        }
        if let Err(err) = self.retrieval.validate() {
            bail!("retrieval: {err}");
        }
        if !self.novelty_threshold.is_finite() {
            bail!("novelty_threshold must be a finite number");
        }
        if self.embedding.http.dimension == 0 {
            bail!("embedding.dimension must be at least 1");
        }
        Ok(())
    }

    pub(crate) fn collections_dir(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    pub(crate) fn records_path(&self) -> PathBuf {
        self.data_dir.join("records.json")
    }
}
