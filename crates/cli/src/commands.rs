use crate::config::AppConfig;
use crate::flags::EmbedMode;
use anyhow::{bail, Context, Result};
use scholar_chunker::{Chunker, TextTokenizer};
use scholar_search::{
    AddedDocument, AssistantConfig, ChatSynthesizer, DocumentLibrary, DocumentUpload,
    IngestPipeline, IngestReport, JsonRecordStore, RecordStore, ResearchAssistant,
    RetrievalAggregator,
};
use scholar_vector_store::{
    BatchConfig, EmbeddingBatcher, EmbeddingProvider, HttpEmbedder, LocalVectorStore,
    StubEmbedder, VectorStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_TITLE_CHARS: usize = 512;
const DEFAULT_LATEST_SUMMARIES: usize = 2;

fn build_chunker(config: &AppConfig) -> Result<Chunker> {
    let tokenizer = TextTokenizer::from_optional_file(config.tokenizer_path.as_deref())
        .context("Failed to load tokenizer")?;
    Chunker::new(config.chunking.clone(), tokenizer).context("Invalid chunking config")
}

fn build_batcher(config: &AppConfig) -> Result<EmbeddingBatcher> {
    let settings = &config.embedding;
    let provider: Arc<dyn EmbeddingProvider> = match settings.mode {
        EmbedMode::Stub => Arc::new(StubEmbedder::new(settings.http.dimension)),
        EmbedMode::Http => Arc::new(
            HttpEmbedder::new(&settings.http).with_context(|| {
                format!(
                    "Embedding mode {} needs an API key (set {} or use --embed-mode stub)",
                    settings.mode.as_str(),
                    crate::config::API_KEY_ENV
                )
            })?,
        ),
    };
    log::debug!(
        "Embedding with {} ({} dims, mode {})",
        provider.model_id(),
        provider.dimension(),
        settings.mode.as_str()
    );

    let batch = BatchConfig {
        instruction: settings
            .prefix_instruction
            .then(|| config.chunking.instruction.clone()),
        ..config.batch.clone()
    };
    EmbeddingBatcher::new(provider, batch).context("Invalid batch config")
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    let dir = config.collections_dir();
    let store = LocalVectorStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open vector store at {}", dir.display()))?;
    Ok(Arc::new(store))
}

async fn open_records(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    let path = config.records_path();
    let records = JsonRecordStore::open(&path)
        .await
        .with_context(|| format!("Failed to open document records at {}", path.display()))?;
    Ok(Arc::new(records))
}

async fn open_library(config: &AppConfig) -> Result<DocumentLibrary> {
    let pipeline = IngestPipeline::new(
        build_chunker(config)?,
        build_batcher(config)?,
        open_store(config).await?,
    );
    Ok(DocumentLibrary::new(pipeline, open_records(config).await?))
}

async fn open_assistant(config: &AppConfig) -> Result<ResearchAssistant> {
    let library = open_library(config).await?;
    let synthesizer = ChatSynthesizer::new(&config.chat).with_context(|| {
        format!(
            "Synthesis needs a chat API key (set {})",
            crate::config::API_KEY_ENV
        )
    })?;
    let assistant_config = AssistantConfig {
        novelty_threshold: config.novelty_threshold,
        retrieval: config.retrieval.clone(),
    };
    Ok(ResearchAssistant::new(
        library,
        Arc::new(synthesizer),
        assistant_config,
    )?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// First non-empty line, used as the title of plain-text documents.
fn title_from_text(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_TITLE_CHARS).collect())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

#[derive(Serialize)]
struct ChunkOutput {
    stats: scholar_chunker::ChunkingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dropped: Option<usize>,
    chunks: Vec<scholar_chunker::Chunk>,
}

pub(crate) async fn run_chunk(
    config: &AppConfig,
    file: &Path,
    for_embedding: bool,
) -> Result<()> {
    let text = read_text(file).await?;
    let chunker = build_chunker(config)?;

    let output = if for_embedding {
        let pass = chunker.chunk_for_embedding(&text)?;
        ChunkOutput {
            stats: Chunker::get_stats(&pass.chunks, config.chunking.max_tokens),
            truncated: Some(pass.truncated),
            dropped: Some(pass.dropped),
            chunks: pass.chunks,
        }
    } else {
        let chunks = chunker.chunk_document(&text)?;
        ChunkOutput {
            stats: Chunker::get_stats(&chunks, config.chunking.max_tokens),
            truncated: None,
            dropped: None,
            chunks,
        }
    };
    log::info!("{}", output.stats);
    print_json(&output)
}

#[derive(Serialize)]
struct IngestOutput {
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_name: Option<String>,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IngestOutput {
    fn from_result(filename: String, result: scholar_search::Result<AddedDocument>) -> Self {
        match result {
            Ok(added) => Self {
                filename: added.record.filename,
                title: Some(added.record.title),
                collection_name: Some(added.record.collection_name),
                skipped: added.report.is_none(),
                report: added.report,
                error: None,
            },
            Err(err) => Self {
                filename,
                title: None,
                collection_name: None,
                skipped: false,
                report: None,
                error: Some(err.to_string()),
            },
        }
    }
}

pub(crate) async fn run_ingest(config: &AppConfig, files: &[PathBuf]) -> Result<()> {
    let library = open_library(config).await?;

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let text = read_text(path).await?;
        let filename = file_name(path)?;
        let title = title_from_text(&text).unwrap_or_else(|| filename.clone());
        uploads.push(DocumentUpload {
            filename,
            title,
            text,
        });
    }
    let filenames: Vec<String> = uploads.iter().map(|u| u.filename.clone()).collect();

    let outputs: Vec<IngestOutput> = filenames
        .into_iter()
        .zip(library.add_documents(uploads).await)
        .map(|(filename, result)| IngestOutput::from_result(filename, result))
        .collect();
    print_json(&outputs)?;

    let failed: Vec<&str> = outputs
        .iter()
        .filter(|o| o.error.is_some())
        .map(|o| o.filename.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("Failed to ingest {}", failed.join(", "));
    }
    Ok(())
}

#[derive(Serialize)]
struct ListEntry {
    filename: String,
    title: String,
    collection_name: String,
    uploaded_at: u64,
    compared: bool,
    summarized: bool,
}

pub(crate) async fn run_list(config: &AppConfig) -> Result<()> {
    let records = open_records(config).await?;
    let entries: Vec<ListEntry> = records
        .list()
        .await?
        .into_iter()
        .map(|r| ListEntry {
            compared: r.novel_insights.is_some(),
            summarized: r.summary.is_some(),
            filename: r.filename,
            title: r.title,
            collection_name: r.collection_name,
            uploaded_at: r.uploaded_at,
        })
        .collect();
    print_json(&entries)
}

pub(crate) async fn run_ask(
    config: &AppConfig,
    question: &str,
    collections: &[String],
    context_only: bool,
) -> Result<()> {
    if context_only {
        let aggregator = RetrievalAggregator::new(
            build_batcher(config)?,
            open_store(config).await?,
            config.retrieval.clone(),
        )?;
        let context = aggregator
            .build_retrieval_context(question, collections)
            .await?;
        return print_json(&context);
    }

    let assistant = open_assistant(config).await?;
    let answer = assistant.answer_question(question, collections).await?;
    print_json(&answer)
}

pub(crate) async fn run_compare(
    config: &AppConfig,
    names: &[String],
    as_collections: bool,
) -> Result<()> {
    if names.len() < 2 {
        bail!("compare needs at least two documents");
    }
    let assistant = open_assistant(config).await?;
    if as_collections {
        let result = assistant.compare_collections(names).await?;
        print_json(&result)
    } else {
        let results = assistant.compare_documents(names).await?;
        print_json(&results)
    }
}

pub(crate) async fn run_summarize(
    config: &AppConfig,
    filenames: &[String],
    latest: Option<usize>,
) -> Result<()> {
    let assistant = open_assistant(config).await?;
    let summaries = if filenames.is_empty() {
        assistant
            .summarize_latest(latest.unwrap_or(DEFAULT_LATEST_SUMMARIES))
            .await?
    } else {
        assistant.summarize_documents(filenames).await?
    };
    print_json(&summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_non_empty_line() {
        assert_eq!(
            title_from_text("\n\n  Sparse Attention at Scale  \nAbstract."),
            Some("Sparse Attention at Scale".to_string())
        );
        assert_eq!(title_from_text(" \n\t\n"), None);
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(
            file_name(Path::new("/tmp/papers/attention.txt")).unwrap(),
            "attention.txt"
        );
    }

    #[tokio::test]
    async fn http_mode_without_key_is_explained() {
        let config = AppConfig::default();
        let err = build_batcher(&config).unwrap_err();
        assert!(format!("{err:#}").contains("--embed-mode stub"));
    }
}
