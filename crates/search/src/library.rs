use crate::error::{Result, SearchError};
use crate::ingest::{IngestPipeline, IngestReport};
use crate::records::{unix_now, DocumentRecord, RecordStore};
use crate::sanitize::{sanitize_collection_name, sanitize_text};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const EXCERPT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedDocument {
    pub record: DocumentRecord,
    /// `None` when the filename was already known and nothing was ingested
    pub report: Option<IngestReport>,
}

/// One extracted document handed to [`DocumentLibrary::add_documents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub filename: String,
    pub title: String,
    pub text: String,
}

enum Prepared {
    Known(DocumentRecord),
    New(DocumentRecord),
}

/// Ingested documents: vector collections plus their metadata records.
#[derive(Clone)]
pub struct DocumentLibrary {
    pipeline: IngestPipeline,
    records: Arc<dyn RecordStore>,
}

impl DocumentLibrary {
    #[must_use]
    pub fn new(pipeline: IngestPipeline, records: Arc<dyn RecordStore>) -> Self {
        Self { pipeline, records }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Ingest `text` under `filename` unless that filename is already recorded.
    pub async fn add_document(
        &self,
        filename: &str,
        title: &str,
        text: &str,
    ) -> Result<AddedDocument> {
        let record = match self.prepare(filename, title, text).await? {
            Prepared::Known(record) => {
                return Ok(AddedDocument {
                    record,
                    report: None,
                })
            }
            Prepared::New(record) => record,
        };

        let text = record.full_text.as_deref().unwrap_or_default();
        let report = self
            .pipeline
            .embed_and_store(text, &record.collection_name)
            .await?;
        self.finish(record, report).await
    }

    /// Ingest several uploads, embedding the new ones concurrently.
    ///
    /// Results come back in input order; a failing upload does not stop the others.
    /// A filename repeated within one call is rejected after its first occurrence.
    pub async fn add_documents(&self, uploads: Vec<DocumentUpload>) -> Vec<Result<AddedDocument>> {
        let mut slots: Vec<Option<Result<AddedDocument>>> = Vec::with_capacity(uploads.len());
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for upload in &uploads {
            if !seen.insert(upload.filename.as_str()) {
                slots.push(Some(Err(SearchError::InvalidRequest(format!(
                    "{} listed more than once",
                    upload.filename
                )))));
                continue;
            }
            match self
                .prepare(&upload.filename, &upload.title, &upload.text)
                .await
            {
                Ok(Prepared::Known(record)) => slots.push(Some(Ok(AddedDocument {
                    record,
                    report: None,
                }))),
                Ok(Prepared::New(record)) => {
                    pending.push((slots.len(), record));
                    slots.push(None);
                }
                Err(err) => slots.push(Some(Err(err))),
            }
        }

        let docs = pending
            .iter()
            .map(|(_, record)| {
                (
                    record.collection_name.clone(),
                    record.full_text.clone().unwrap_or_default(),
                )
            })
            .collect();
        let reports = self.pipeline.embed_many(docs).await;

        for ((slot, record), report) in pending.into_iter().zip(reports) {
            let added = match report {
                Ok(report) => self.finish(record, report).await,
                Err(err) => Err(err),
            };
            slots[slot] = Some(added);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(SearchError::Other("upload was not processed".into())))
            })
            .collect()
    }

    /// Existing record for `filename`, or a new unsaved record carrying the sanitized text.
    async fn prepare(&self, filename: &str, title: &str, text: &str) -> Result<Prepared> {
        if let Some(record) = self.records.find_by_filename(filename).await? {
            log::info!(
                "{filename} already ingested as {}; skipping",
                record.collection_name
            );
            return Ok(Prepared::Known(record));
        }

        let full_text = sanitize_text(text);
        if full_text.is_empty() {
            return Err(SearchError::InvalidRequest(format!(
                "{filename} contains no text"
            )));
        }
        let title = match sanitize_text(title) {
            t if t.is_empty() => filename.to_string(),
            t => t,
        };
        let collection = collection_name_for(filename, &full_text);

        Ok(Prepared::New(DocumentRecord {
            text_excerpt: full_text.chars().take(EXCERPT_CHARS).collect(),
            full_text: Some(full_text),
            ..DocumentRecord::new(filename, title, collection)
        }))
    }

    async fn finish(&self, record: DocumentRecord, report: IngestReport) -> Result<AddedDocument> {
        self.records.save(record.clone()).await?;
        Ok(AddedDocument {
            record,
            report: Some(report),
        })
    }

    /// Look up records for `filenames`, in order; unknown names are an error.
    pub async fn resolve(&self, filenames: &[String]) -> Result<Vec<DocumentRecord>> {
        let mut resolved = Vec::with_capacity(filenames.len());
        for name in filenames {
            let record = self
                .records
                .find_by_filename(name)
                .await?
                .ok_or_else(|| SearchError::RecordNotFound(name.clone()))?;
            resolved.push(record);
        }
        Ok(resolved)
    }

    /// Re-embed a collection from the record's cached full text.
    pub async fn reembed(&self, record: &DocumentRecord) -> Result<IngestReport> {
        let text = record
            .full_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                SearchError::InvalidRequest(format!(
                    "no stored text for {} to re-embed",
                    record.collection_name
                ))
            })?;
        log::warn!(
            "Collection {} is empty; re-embedding from cached text",
            record.collection_name
        );
        self.pipeline
            .embed_and_store(text, &record.collection_name)
            .await
    }
}

/// `"{sanitized stem}_{8 hex}"`; the suffix keeps same-named uploads apart.
fn collection_name_for(filename: &str, text: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let mut safe = sanitize_collection_name(stem);
    if safe.is_empty() {
        safe = "document".to_string();
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(unix_now().to_le_bytes());
    let digest = hasher.finalize();
    let suffix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

    safe.truncate(100 - suffix.len() - 1);
    format!("{safe}_{suffix}")
}
