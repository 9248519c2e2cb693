use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Embedding backend used by this process.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EmbedMode {
    /// Remote embeddings API
    #[default]
    Http,
    /// Deterministic offline vectors
    Stub,
}

impl EmbedMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Http => "http",
            EmbedMode::Stub => "stub",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" | "mistral" | "remote" => Some(EmbedMode::Http),
            "stub" => Some(EmbedMode::Stub),
            _ => None,
        }
    }
}
