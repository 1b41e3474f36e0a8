//! Query-time retrieval over the embedding index.

use crate::embeddings::EmbeddingProvider;
use crate::index::EmbeddingIndex;
use crate::types::ScoredChunk;
use libris_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::debug;

/// Ranks corpus chunks against a query.
///
/// Couples the index to the query embedder and refuses to exist if the two
/// disagree on model or dimensionality. A retriever that embeds queries with
/// a different model than the corpus produces scores that look plausible and
/// mean nothing, so the mismatch is a construction error, not a per-query
/// one.
#[derive(Debug)]
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
        min_score: f32,
    ) -> AppResult<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(AppError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            });
        }

        if embedder.model_name() != index.model() {
            return Err(AppError::Config(format!(
                "Index was built with embedding model '{}' but the configured model is '{}'. \
                 Re-run ingest or change the embedding configuration.",
                index.model(),
                embedder.model_name()
            )));
        }

        Ok(Self {
            index,
            embedder,
            top_k,
            min_score,
        })
    }

    /// Retrieve the best-matching chunks for a query.
    ///
    /// `k` overrides the configured `top_k` for this call. Chunks below the
    /// relevance floor are dropped after ranking; if nothing clears it the
    /// result is `NoResults`, which the façade turns into a friendly
    /// "nothing in the books" response rather than an error page.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: Option<usize>,
        book_filter: Option<&str>,
    ) -> AppResult<Vec<ScoredChunk>> {
        let query = self.embedder.embed(query_text).await?;
        let k = k.unwrap_or(self.top_k);

        let mut results = self.index.similar(&query, k, book_filter)?;
        results.retain(|s| s.score >= self.min_score);

        debug!(
            "Retrieved {} chunks above floor {} (k={}, filter={:?})",
            results.len(),
            self.min_score,
            k,
            book_filter
        );

        if results.is_empty() {
            return Err(AppError::NoResults);
        }

        Ok(results)
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::mock::MockEmbedder;
    use crate::types::{Book, Chunk};

    fn chunk(book_id: &str, position: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{}:{:04}", book_id, position),
            book_id: book_id.to_string(),
            text: text.to_string(),
            chapter: None,
            position,
            digest: format!("{:012x}", position),
            word_count: text.split_whitespace().count() as u32,
        }
    }

    async fn index_with(dimensions: usize) -> Arc<EmbeddingIndex> {
        let books = vec![
            Book {
                book_id: "embodied-mind".to_string(),
                title: "The Embodied Mind".to_string(),
                color_tag: None,
            },
            Book {
                book_id: "signals".to_string(),
                title: "Signals in the Noise".to_string(),
                color_tag: None,
            },
        ];
        let chunks = vec![
            chunk(
                "embodied-mind",
                0,
                "Enaction means cognition emerges through embodied sensorimotor activity.",
            ),
            chunk(
                "embodied-mind",
                1,
                "The lived body grounds perception before reflection begins.",
            ),
            chunk(
                "signals",
                0,
                "Statistical noise obscures weak periodic signals in long time series.",
            ),
        ];

        let embedder = MockEmbedder::new(dimensions);
        Arc::new(EmbeddingIndex::build(books, chunks, &embedder).await.unwrap())
    }

    #[tokio::test]
    async fn test_retrieve_returns_relevant_chunks() {
        let index = index_with(256).await;
        let retriever =
            Retriever::new(index, Arc::new(MockEmbedder::new(256)), 3, 0.05).unwrap();

        let results = retriever
            .retrieve("embodied sensorimotor cognition", None, None)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.book_id, "embodied-mind");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_retrieve_nothing_relevant_is_no_results() {
        let index = index_with(256).await;
        // Floor high enough that nothing clears it
        let retriever =
            Retriever::new(index, Arc::new(MockEmbedder::new(256)), 3, 0.999).unwrap();

        let err = retriever
            .retrieve("completely unrelated topic", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoResults));
    }

    #[tokio::test]
    async fn test_retrieve_book_filter_excludes_other_books() {
        let index = index_with(256).await;
        let retriever =
            Retriever::new(index, Arc::new(MockEmbedder::new(256)), 10, 0.0).unwrap();

        let results = retriever
            .retrieve("embodied cognition", None, Some("signals"))
            .await
            .unwrap();

        assert!(results.iter().all(|s| s.chunk.book_id == "signals"));
    }

    #[tokio::test]
    async fn test_k_override() {
        let index = index_with(256).await;
        let retriever =
            Retriever::new(index, Arc::new(MockEmbedder::new(256)), 3, 0.0).unwrap();

        let results = retriever
            .retrieve("body perception", Some(1), None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_at_construction() {
        let index = index_with(256).await;
        let err =
            Retriever::new(index, Arc::new(MockEmbedder::new(128)), 3, 0.2).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { .. }));
    }
}
