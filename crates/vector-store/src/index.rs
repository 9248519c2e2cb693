use crate::embeddings::cosine_similarity;
use crate::error::{Result, VectorStoreError};
use crate::types::{QueryHit, StoredEntry};
use std::collections::HashMap;

/// Brute-force cosine index over one collection, insertion order preserved.
#[derive(Debug, Clone, Default)]
pub struct CollectionIndex {
    dimension: Option<usize>,
    entries: Vec<StoredEntry>,
    positions: HashMap<String, usize>,
}

impl CollectionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<StoredEntry>) -> Result<Self> {
        let mut index = Self::new();
        for entry in entries {
            index.upsert(entry)?;
        }
        Ok(index)
    }

    /// Insert or replace by id. The first vector fixes the collection's dimension.
    pub fn upsert(&mut self, entry: StoredEntry) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != entry.vector.len() => {
                return Err(VectorStoreError::InvalidDimension {
                    expected,
                    actual: entry.vector.len(),
                });
            }
            Some(_) => {}
            None => {
                if entry.vector.is_empty() {
                    return Err(VectorStoreError::IndexError(format!(
                        "entry {} has an empty vector",
                        entry.id
                    )));
                }
                self.dimension = Some(entry.vector.len());
            }
        }

        if let Some(&pos) = self.positions.get(&entry.id) {
            self.entries[pos] = entry;
        } else {
            self.positions.insert(entry.id.clone(), self.entries.len());
            self.entries.push(entry);
        }
        Ok(())
    }

    /// Top `k` entries by cosine similarity, ties kept in insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, cosine_similarity(query, &entry.vector)))
            .collect();
        scores.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
        scores.truncate(k);

        Ok(scores
            .into_iter()
            .map(|(pos, score)| {
                let entry = &self.entries[pos];
                QueryHit {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    score,
                }
            })
            .collect())
    }

    #[must_use]
    pub fn entries(&self) -> &[StoredEntry] {
        &self.entries
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// NaN scores (non-finite vectors) rank below every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
