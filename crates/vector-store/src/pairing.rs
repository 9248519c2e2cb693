use crate::types::EmbeddedChunk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paired {
    pub items: Vec<EmbeddedChunk>,
    /// Texts or vectors left without a partner
    pub dropped: usize,
}

/// Zip texts with vectors position by position, truncating to the shorter side.
#[must_use]
pub fn pair_embeddings(texts: Vec<String>, vectors: Vec<Vec<f32>>) -> Paired {
    let dropped = texts.len().abs_diff(vectors.len());
    if dropped > 0 {
        log::warn!(
            "Pairing {} texts with {} vectors; dropping {} unmatched",
            texts.len(),
            vectors.len(),
            dropped
        );
    }

    let items = texts
        .into_iter()
        .zip(vectors)
        .map(|(text, vector)| EmbeddedChunk { text, vector })
        .collect();
    Paired { items, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn equal_lengths_pair_everything() {
        let paired = pair_embeddings(strings(&["a", "b"]), vec![vec![1.0], vec![2.0]]);
        assert_eq!(paired.dropped, 0);
        assert_eq!(paired.items[1], EmbeddedChunk::new("b", vec![2.0]));
    }

    #[test]
    fn extra_texts_are_dropped() {
        let paired = pair_embeddings(strings(&["a", "b", "c"]), vec![vec![1.0]]);
        assert_eq!(paired.items.len(), 1);
        assert_eq!(paired.items[0].text, "a");
        assert_eq!(paired.dropped, 2);
    }

    #[test]
    fn extra_vectors_are_dropped() {
        let paired = pair_embeddings(strings(&["a"]), vec![vec![1.0], vec![2.0]]);
        assert_eq!(paired.items.len(), 1);
        assert_eq!(paired.dropped, 1);
    }
}
