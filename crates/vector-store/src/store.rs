use crate::error::{Result, VectorStoreError};
use crate::index::CollectionIndex;
use crate::types::{CollectionSnapshot, QueryHit, StoredEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Named collections of embedded texts.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries by id, creating the collection on first write.
    async fn upsert(&self, collection: &str, entries: Vec<StoredEntry>) -> Result<()>;

    /// Top `k` entries of `collection` by cosine similarity to `vector`.
    ///
    /// Querying a collection that was never written is an error.
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryHit>>;

    /// Every entry of `collection`; unknown collections yield an empty snapshot.
    async fn get_all(&self, collection: &str) -> Result<CollectionSnapshot>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCollection {
    name: String,
    entries: Vec<StoredEntry>,
}

/// In-process vector store, optionally mirrored to one JSON file per collection.
#[derive(Debug, Default)]
pub struct LocalVectorStore {
    collections: RwLock<HashMap<String, CollectionIndex>>,
    dir: Option<PathBuf>,
}

impl LocalVectorStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) a store directory and load every `*.json` collection in it.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = read_dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            let persisted: PersistedCollection = serde_json::from_str(&data)?;
            let index = CollectionIndex::from_entries(persisted.entries)?;
            log::debug!(
                "Loaded collection {} ({} entries)",
                persisted.name,
                index.len()
            );
            collections.insert(persisted.name, index);
        }

        log::info!("Opened vector store at {:?} ({} collections)", dir, collections.len());
        Ok(Self {
            collections: RwLock::new(collections),
            dir: Some(dir),
        })
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    async fn persist(&self, name: &str, index: &CollectionIndex) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let persisted = PersistedCollection {
            name: name.to_string(),
            entries: index.entries().to_vec(),
        };
        let data = serde_json::to_vec(&persisted)?;
        let path = dir.join(format!("{name}.json"));
        let tmp = dir.join(format!("{name}.json.tmp"));
        tokio::fs::write(&tmp, &data).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(VectorStoreError::IndexError(format!(
            "invalid collection name: {name:?}"
        )))
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert(&self, collection: &str, entries: Vec<StoredEntry>) -> Result<()> {
        validate_collection_name(collection)?;
        let count = entries.len();

        let mut collections = self.collections.write().await;
        let mut index = collections.get(collection).cloned().unwrap_or_default();
        for entry in entries {
            index.upsert(entry)?;
        }
        self.persist(collection, &index).await?;
        log::debug!(
            "Upserted {count} entries into {collection} (total {})",
            index.len()
        );
        collections.insert(collection.to_string(), index);
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let collections = self.collections.read().await;
        let index = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        index.search(vector, k)
    }

    async fn get_all(&self, collection: &str) -> Result<CollectionSnapshot> {
        let collections = self.collections.read().await;
        let Some(index) = collections.get(collection) else {
            return Ok(CollectionSnapshot::default());
        };

        let mut snapshot = CollectionSnapshot::default();
        for entry in index.entries() {
            snapshot.ids.push(entry.id.clone());
            snapshot.texts.push(entry.text.clone());
            snapshot.vectors.push(entry.vector.clone());
        }
        Ok(snapshot)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, text: &str, vector: &[f32]) -> StoredEntry {
        StoredEntry {
            id: id.to_string(),
            text: text.to_string(),
            vector: vector.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let store = LocalVectorStore::in_memory();
        store
            .upsert(
                "paper_a",
                vec![
                    entry("1", "attention", &[1.0, 0.0]),
                    entry("2", "convolution", &[0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("paper_a", &[1.0, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "attention");
    }

    #[tokio::test]
    async fn unknown_collection_query_fails_but_get_all_is_empty() {
        let store = LocalVectorStore::in_memory();
        let err = store.query("missing", &[1.0], 3).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
        assert!(store.get_all("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_unsafe_collection_names() {
        let store = LocalVectorStore::in_memory();
        let result = store
            .upsert("../escape", vec![entry("1", "x", &[1.0])])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = LocalVectorStore::open(temp_dir.path()).await.unwrap();
            store
                .upsert("paper_b", vec![entry("1", "graph kernels", &[0.5, 0.5])])
                .await
                .unwrap();
        }

        assert!(temp_dir.path().join("paper_b.json").exists());
        let reopened = LocalVectorStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.list_collections().await.unwrap(), vec!["paper_b"]);
        let snapshot = reopened.get_all("paper_b").await.unwrap();
        assert_eq!(snapshot.texts, vec!["graph kernels".to_string()]);
        assert_eq!(snapshot.vectors, vec![vec![0.5, 0.5]]);
    }
}
