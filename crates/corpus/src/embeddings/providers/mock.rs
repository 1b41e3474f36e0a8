//! Deterministic mock embedding provider.

use crate::embeddings::provider::EmbeddingProvider;
use libris_core::AppResult;
use std::collections::HashMap;

/// Words too common to carry retrieval signal.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "does",
];

/// Mock provider for tests and offline development.
///
/// Derives a vector from character trigrams and word frequencies of the
/// input. Not semantically meaningful like a real embedding model, but
/// deterministic and content-sensitive: texts sharing vocabulary land close
/// together under cosine similarity, which is enough to exercise the full
/// retrieval pipeline without a network.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.len() > 2 && !STOP_WORDS.contains(&word) {
                *frequencies.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &frequencies {
            // Spread each word over several dimensions via its trigrams,
            // sqrt-scaled so a repeated word does not dominate the vector.
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let slot = hash_chars(window, 37) as usize % self.dimensions;
                vector[slot] += (*freq as f32).sqrt();
            }

            // And the whole word in one dimension of its own.
            let slot = hash_chars(&chars, 31) as usize % self.dimensions;
            vector[slot] += *freq as f32;
        }

        normalize(&mut vector);
        vector
    }
}

fn hash_chars(chars: &[char], seed: u64) -> u64 {
    let mut acc = 0u64;
    for c in chars {
        let mut buf = [0u8; 4];
        for b in c.encode_utf8(&mut buf).bytes() {
            acc = acc.wrapping_mul(seed).wrapping_add(b as u64);
        }
    }
    acc
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity() {
        let embedder = MockEmbedder::new(128);
        assert_eq!(embedder.provider_name(), "mock");
        assert_eq!(embedder.model_name(), "trigram-v1");
        assert_eq!(embedder.dimensions(), 128);
    }

    #[tokio::test]
    async fn test_unit_vector() {
        let embedder = MockEmbedder::new(128);
        let vector = embedder.embed("perception and embodied cognition").await.unwrap();

        assert_eq!(vector.len(), 128);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = MockEmbedder::new(128);
        let a = embedder.embed("the same text").await.unwrap();
        let b = embedder.embed("the same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_different_texts_differ() {
        let embedder = MockEmbedder::new(128);
        let a = embedder.embed("phenomenology of perception").await.unwrap();
        let b = embedder.embed("compiler optimization passes").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = MockEmbedder::new(256);
        let query = embedder.embed("embodied cognition").await.unwrap();
        let related = embedder
            .embed("embodied cognition shapes perception")
            .await
            .unwrap();
        let unrelated = embedder
            .embed("quarterly revenue projections spreadsheet")
            .await
            .unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_zero_vector() {
        let embedder = MockEmbedder::new(128);
        let vector = embedder.embed("").await.unwrap();
        assert!(vector.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_input() {
        let embedder = MockEmbedder::new(128);
        let vector = embedder.embed("la phénoménologie de la perception").await.unwrap();
        assert_eq!(vector.len(), 128);
    }
}
