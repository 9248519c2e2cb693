use crate::compare::ResearchAssistant;
use crate::error::{Result, SearchError};
use crate::prompts::{aggregate_summary_prompt, chunk_summary_prompt};
use crate::records::DocumentRecord;
use crate::synthesis::Synthesizer;
use scholar_chunker::Chunker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub title: String,
    pub summary: String,
}

/// Summarize every chunk concurrently, then merge the partial summaries in one more call.
pub async fn summarize_document(
    synthesizer: Arc<dyn Synthesizer>,
    chunker: &Chunker,
    text: &str,
) -> Result<String> {
    let chunks = chunker.chunk_document(text)?;
    if chunks.is_empty() {
        return Err(SearchError::NoValidChunks);
    }
    let total = chunks.len();
    log::info!("Summarizing document in {total} chunks");

    let mut tasks = JoinSet::new();
    for chunk in chunks {
        let synthesizer = Arc::clone(&synthesizer);
        tasks.spawn(async move {
            let position = chunk.sequence_index + 1;
            let prompt = chunk_summary_prompt(&chunk.text, position, total);
            let summary = synthesizer.complete(&prompt).await;
            (chunk.sequence_index, summary)
        });
    }

    let mut partials: Vec<Option<String>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        let (index, summary) = joined
            .map_err(|e| SearchError::Synthesis(format!("chunk summary task failed: {e}")))?;
        let summary = summary?;
        log::debug!("Chunk {}/{} summary: {} chars", index + 1, total, summary.len());
        partials[index] = Some(summary.trim().to_string());
    }
    let partials: Vec<String> = partials.into_iter().flatten().collect();

    let combined = synthesizer
        .complete(&aggregate_summary_prompt(&partials))
        .await?;
    let combined = combined.trim().to_string();
    log::info!("Final summary: {} chars", combined.len());
    Ok(combined)
}

impl ResearchAssistant {
    /// Summarize a text with the summary chunking preset.
    pub async fn summarize_text(&self, text: &str) -> Result<String> {
        summarize_document(Arc::clone(&self.synthesizer), &self.summary_chunker, text).await
    }

    /// Summarize ingested documents concurrently and store each summary on its record.
    pub async fn summarize_documents(&self, filenames: &[String]) -> Result<Vec<DocumentSummary>> {
        let records = self.library.resolve(filenames).await?;

        let mut tasks = JoinSet::new();
        for (position, record) in records.iter().enumerate() {
            let text = record
                .full_text
                .clone()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    SearchError::InvalidRequest(format!(
                        "no stored text for {} to summarize",
                        record.filename
                    ))
                })?;
            let assistant = self.clone();
            tasks.spawn(async move { (position, assistant.summarize_text(&text).await) });
        }

        let mut summaries: Vec<Option<String>> = vec![None; records.len()];
        while let Some(joined) = tasks.join_next().await {
            let (position, summary) = joined
                .map_err(|e| SearchError::Synthesis(format!("summary task failed: {e}")))?;
            summaries[position] = Some(summary?);
        }

        let mut results = Vec::with_capacity(records.len());
        for (record, summary) in records.into_iter().zip(summaries) {
            let summary = summary.ok_or_else(|| {
                SearchError::Synthesis(format!("no summary produced for {}", record.filename))
            })?;
            results.push(DocumentSummary {
                filename: record.filename.clone(),
                title: record.title.clone(),
                summary: summary.clone(),
            });
            self.library
                .records()
                .save(DocumentRecord {
                    summary: Some(summary),
                    ..record
                })
                .await?;
        }
        Ok(results)
    }

    /// Summarize the `limit` most recently uploaded documents, newest first.
    pub async fn summarize_latest(&self, limit: usize) -> Result<Vec<DocumentSummary>> {
        if limit == 0 {
            return Err(SearchError::InvalidRequest(
                "summarize needs a limit of at least 1".to_string(),
            ));
        }
        let filenames: Vec<String> = self
            .library
            .records()
            .list()
            .await?
            .into_iter()
            .take(limit)
            .map(|r| r.filename)
            .collect();
        if filenames.is_empty() {
            return Err(SearchError::InvalidRequest(
                "no documents have been ingested yet".to_string(),
            ));
        }
        log::info!("Summarizing the {} latest documents", filenames.len());
        self.summarize_documents(&filenames).await
    }
}
