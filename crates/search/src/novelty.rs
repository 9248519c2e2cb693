use crate::error::{Result, SearchError};
use ndarray::{Array2, Axis};
use scholar_vector_store::EmbeddedChunk;

/// Base chunks at least this similar to any comparison chunk are considered redundant.
pub const DEFAULT_NOVELTY_THRESHOLD: f32 = 0.60;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoveltyOutcome {
    /// Retained base texts, base order preserved
    pub novel: Vec<String>,
    /// Max similarity of every base chunk to the comparison set; empty when no
    /// comparison was made
    pub max_similarities: Vec<f32>,
}

impl NoveltyOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.novel.is_empty()
    }
}

/// Keep the base chunks whose highest cosine similarity to every comparison chunk stays
/// strictly below `threshold`.
///
/// With an empty base or comparison set the base texts come back unfiltered.
pub fn find_novel_chunks(
    base: &[EmbeddedChunk],
    comparison: &[EmbeddedChunk],
    threshold: f32,
) -> Result<NoveltyOutcome> {
    if base.is_empty() || comparison.is_empty() {
        return Ok(NoveltyOutcome {
            novel: base.iter().map(|c| c.text.clone()).collect(),
            max_similarities: Vec::new(),
        });
    }

    let dimension = base[0].vector.len();
    let base_matrix = unit_rows(base, dimension)?;
    let comparison_matrix = unit_rows(comparison, dimension)?;

    // rows: base, columns: comparison
    let similarities = base_matrix.dot(&comparison_matrix.t());
    let max_similarities: Vec<f32> = similarities
        .axis_iter(Axis(0))
        .map(|row| row.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x)))
        .collect();

    let novel: Vec<String> = base
        .iter()
        .zip(&max_similarities)
        .filter(|(_, max)| **max < threshold)
        .map(|(chunk, _)| chunk.text.clone())
        .collect();

    log::debug!(
        "Novelty filter kept {}/{} base chunks against {} comparison chunks (threshold {:.2})",
        novel.len(),
        base.len(),
        comparison.len(),
        threshold
    );

    Ok(NoveltyOutcome {
        novel,
        max_similarities,
    })
}

/// L2-normalized rows; zero-norm rows stay zero so their similarities are 0.
fn unit_rows(chunks: &[EmbeddedChunk], dimension: usize) -> Result<Array2<f32>> {
    let mut flat = Vec::with_capacity(chunks.len() * dimension);
    for chunk in chunks {
        if chunk.vector.len() != dimension {
            return Err(SearchError::DimensionMismatch {
                expected: dimension,
                actual: chunk.vector.len(),
            });
        }
        let norm = chunk.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            flat.extend(chunk.vector.iter().map(|v| v / norm));
        } else {
            flat.extend(std::iter::repeat(0.0).take(dimension));
        }
    }

    Array2::from_shape_vec((chunks.len(), dimension), flat)
        .map_err(|e| SearchError::Other(format!("failed to build similarity matrix: {e}")))
}
