//! In-memory embedding index with exhaustive cosine scan.
//!
//! The corpus is a handful of books, so candidate selection is a linear scan
//! over every stored vector. No approximate-nearest-neighbor structure is
//! warranted at this scale, and the exhaustive scan keeps ranking exact and
//! fully deterministic.

use crate::embeddings::EmbeddingProvider;
use crate::store::{
    self, ChunkStoreFile, EmbeddingRecord, EmbeddingStoreFile, STORE_VERSION,
};
use crate::types::{Book, Chunk, ScoredChunk};
use chrono::{DateTime, Utc};
use libris_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// An indexed chunk with its embedding vector.
#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Immutable similarity index over the whole corpus.
///
/// Built offline by `libris ingest` or loaded from the persisted stores at
/// process start. Request handlers share it behind an `Arc` and only read.
#[derive(Debug)]
pub struct EmbeddingIndex {
    books: Vec<Book>,
    entries: Vec<IndexEntry>,
    dimensions: usize,
    model: String,
    built_at: DateTime<Utc>,
}

impl EmbeddingIndex {
    /// Build an index by embedding every chunk with the given provider.
    pub async fn build(
        books: Vec<Book>,
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
    ) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::Corpus(
                "Cannot build an index from zero chunks".to_string(),
            ));
        }

        info!(
            "Embedding {} chunks with {}/{}",
            chunks.len(),
            provider.provider_name(),
            provider.model_name()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = provider.dimensions();
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            if vector.len() != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
            debug!("Embedded chunk {}", chunk.chunk_id);
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            books,
            entries,
            dimensions,
            model: provider.model_name().to_string(),
            built_at: Utc::now(),
        })
    }

    /// Load the index from the persisted chunk and embedding stores.
    ///
    /// Missing files mean the corpus was never ingested and surface as
    /// `IndexNotLoaded`. Inconsistencies between the two stores are corpus
    /// integrity failures.
    pub fn load(chunks_path: &Path, embeddings_path: &Path) -> AppResult<Self> {
        let chunk_store = store::load_chunk_store(chunks_path)?;
        let embedding_store = store::load_embedding_store(embeddings_path)?;

        if embedding_store.embeddings.len() != chunk_store.chunks.len() {
            return Err(AppError::Corpus(format!(
                "Store mismatch: {} chunks but {} embeddings",
                chunk_store.chunks.len(),
                embedding_store.embeddings.len()
            )));
        }

        let mut vectors: HashMap<String, Vec<f32>> = embedding_store
            .embeddings
            .into_iter()
            .map(|r| (r.chunk_id, r.vector))
            .collect();

        let mut entries = Vec::with_capacity(chunk_store.chunks.len());
        for chunk in chunk_store.chunks {
            let vector = vectors.remove(&chunk.chunk_id).ok_or_else(|| {
                AppError::Corpus(format!(
                    "Chunk '{}' has no embedding in the store",
                    chunk.chunk_id
                ))
            })?;
            entries.push(IndexEntry { chunk, vector });
        }

        info!(
            "Loaded index: {} chunks across {} books, model '{}', dim {}",
            entries.len(),
            chunk_store.books.len(),
            embedding_store.model,
            embedding_store.dimensions
        );

        Ok(Self {
            books: chunk_store.books,
            entries,
            dimensions: embedding_store.dimensions,
            model: embedding_store.model,
            built_at: chunk_store.built_at,
        })
    }

    /// Persist the index as the chunk and embedding store files.
    pub fn save(&self, chunks_path: &Path, embeddings_path: &Path) -> AppResult<()> {
        let chunk_store = ChunkStoreFile {
            version: STORE_VERSION,
            built_at: self.built_at,
            books: self.books.clone(),
            chunks: self.entries.iter().map(|e| e.chunk.clone()).collect(),
        };

        let embedding_store = EmbeddingStoreFile {
            version: STORE_VERSION,
            model: self.model.clone(),
            dimensions: self.dimensions,
            embeddings: self
                .entries
                .iter()
                .map(|e| EmbeddingRecord {
                    chunk_id: e.chunk.chunk_id.clone(),
                    vector: e.vector.clone(),
                })
                .collect(),
        };

        store::save_chunk_store(chunks_path, &chunk_store)?;
        store::save_embedding_store(embeddings_path, &embedding_store)?;
        Ok(())
    }

    /// Rank all chunks by cosine similarity to the query vector and return
    /// the top `k`, optionally restricted to a single book.
    ///
    /// Ties break on `chunk_id` so identical inputs always produce the same
    /// ranking. Scores are not filtered here; the relevance floor is the
    /// retriever's policy.
    pub fn similar(
        &self,
        query: &[f32],
        k: usize,
        book_filter: Option<&str>,
    ) -> AppResult<Vec<ScoredChunk>> {
        if query.len() != self.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .filter(|e| book_filter.map_or(true, |b| e.chunk.book_id == b))
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Books in the corpus, in ingest order.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Display title for a book id, if the book exists.
    pub fn book_title(&self, book_id: &str) -> Option<&str> {
        self.books
            .iter()
            .find(|b| b.book_id == book_id)
            .map(|b| b.title.as_str())
    }

    /// Number of chunks a book contributed to the index.
    pub fn chunk_count(&self, book_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.chunk.book_id == book_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embedding model the index was built with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
