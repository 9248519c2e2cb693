use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Metadata kept for every ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub title: String,
    pub collection_name: String,
    pub text_excerpt: String,
    /// Cached for re-embedding when the collection is found empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    /// Unix seconds
    pub uploaded_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novel_insights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_gaps: Option<String>,
}

impl DocumentRecord {
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        title: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
            collection_name: collection_name.into(),
            text_excerpt: String::new(),
            full_text: None,
            uploaded_at: unix_now(),
            summary: None,
            novel_insights: None,
            similarities: None,
            missing_gaps: None,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Persistence for [`DocumentRecord`]s.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_filename(&self, filename: &str) -> Result<Option<DocumentRecord>>;

    async fn find_by_title(&self, title: &str) -> Result<Option<DocumentRecord>>;

    async fn find_by_collection(&self, collection: &str) -> Result<Option<DocumentRecord>>;

    /// Insert, or replace the record with the same filename.
    async fn save(&self, record: DocumentRecord) -> Result<()>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<DocumentRecord>>;
}

/// Records held in memory and optionally mirrored to a single JSON file.
#[derive(Debug, Default)]
pub struct JsonRecordStore {
    records: RwLock<Vec<DocumentRecord>>,
    path: Option<PathBuf>,
}

impl JsonRecordStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `path` if it exists; later saves rewrite it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        log::debug!("Loaded {} document records from {:?}", records.len(), path);
        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    async fn persist(&self, records: &[DocumentRecord]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        if let Err(err) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn find_by<F>(&self, predicate: F) -> Option<DocumentRecord>
    where
        F: Fn(&DocumentRecord) -> bool + Send,
    {
        self.records
            .read()
            .await
            .iter()
            .find(|record| predicate(record))
            .cloned()
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn find_by_filename(&self, filename: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.find_by(|r| r.filename == filename).await)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.find_by(|r| r.title == title).await)
    }

    async fn find_by_collection(&self, collection: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.find_by(|r| r.collection_name == collection).await)
    }

    async fn save(&self, record: DocumentRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.filename == record.filename) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.persist(&records).await
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let records = self.records.read().await;
        // stable sort keeps later inserts first among equal timestamps
        let mut listed: Vec<DocumentRecord> = records.iter().rev().cloned().collect();
        listed.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(listed)
    }
}
