//! Persisted chunk and embedding stores.
//!
//! Two JSON files built offline by `libris ingest` and consumed read-only at
//! process start: the chunk store (books + passages) and the embedding store
//! (model identity + one vector per chunk). Loading is a strongly-typed
//! validate step that fails fast on malformed or inconsistent data, so a
//! broken deployment never surfaces as a per-request error.

use crate::types::{Book, Chunk};
use chrono::{DateTime, Utc};
use libris_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Current store format version.
pub const STORE_VERSION: u32 = 1;

/// Persisted chunk store: the corpus text and its books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStoreFile {
    /// Format version
    pub version: u32,

    /// When the store was built
    pub built_at: DateTime<Utc>,

    /// Books in the corpus
    pub books: Vec<Book>,

    /// All chunks, ordered by book and position
    pub chunks: Vec<Chunk>,
}

/// Persisted embedding store: one vector per chunk.
///
/// Records the embedding model so query-time configuration can be checked
/// against what the corpus was actually embedded with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStoreFile {
    /// Format version
    pub version: u32,

    /// Embedding model the vectors were produced with
    pub model: String,

    /// Vector dimensionality, constant across the store
    pub dimensions: usize,

    /// One record per chunk
    pub embeddings: Vec<EmbeddingRecord>,
}

/// A chunk's embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

/// Load and validate the chunk store.
pub fn load_chunk_store(path: &Path) -> AppResult<ChunkStoreFile> {
    if !path.exists() {
        return Err(AppError::IndexNotLoaded);
    }

    let contents = std::fs::read_to_string(path)?;
    let store: ChunkStoreFile = serde_json::from_str(&contents)
        .map_err(|e| AppError::Corpus(format!("Malformed chunk store {:?}: {}", path, e)))?;

    validate_chunk_store(&store)?;
    Ok(store)
}

/// Load and validate the embedding store.
pub fn load_embedding_store(path: &Path) -> AppResult<EmbeddingStoreFile> {
    if !path.exists() {
        return Err(AppError::IndexNotLoaded);
    }

    let contents = std::fs::read_to_string(path)?;
    let store: EmbeddingStoreFile = serde_json::from_str(&contents)
        .map_err(|e| AppError::Corpus(format!("Malformed embedding store {:?}: {}", path, e)))?;

    validate_embedding_store(&store)?;
    Ok(store)
}

/// Write the chunk store to disk.
pub fn save_chunk_store(path: &Path, store: &ChunkStoreFile) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(store)?;
    std::fs::write(path, json)?;
    tracing::info!("Wrote chunk store with {} chunks to {:?}", store.chunks.len(), path);
    Ok(())
}

/// Write the embedding store to disk.
pub fn save_embedding_store(path: &Path, store: &EmbeddingStoreFile) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(store)?;
    std::fs::write(path, json)?;
    tracing::info!(
        "Wrote embedding store ({} vectors, dim {}) to {:?}",
        store.embeddings.len(),
        store.dimensions,
        path
    );
    Ok(())
}

fn validate_chunk_store(store: &ChunkStoreFile) -> AppResult<()> {
    if store.version != STORE_VERSION {
        return Err(AppError::Corpus(format!(
            "Unsupported chunk store version {} (expected {})",
            store.version, STORE_VERSION
        )));
    }

    if store.chunks.is_empty() {
        return Err(AppError::Corpus("Chunk store contains no chunks".to_string()));
    }

    let book_ids: HashSet<&str> = store.books.iter().map(|b| b.book_id.as_str()).collect();
    if book_ids.len() != store.books.len() {
        return Err(AppError::Corpus("Duplicate book ids in chunk store".to_string()));
    }

    let mut chunk_ids = HashSet::new();
    for chunk in &store.chunks {
        if chunk.text.trim().is_empty() {
            return Err(AppError::Corpus(format!(
                "Chunk '{}' has empty text",
                chunk.chunk_id
            )));
        }
        if !book_ids.contains(chunk.book_id.as_str()) {
            return Err(AppError::Corpus(format!(
                "Chunk '{}' references unknown book '{}'",
                chunk.chunk_id, chunk.book_id
            )));
        }
        if !chunk_ids.insert(chunk.chunk_id.as_str()) {
            return Err(AppError::Corpus(format!(
                "Duplicate chunk id '{}'",
                chunk.chunk_id
            )));
        }
    }

    Ok(())
}

fn validate_embedding_store(store: &EmbeddingStoreFile) -> AppResult<()> {
    if store.version != STORE_VERSION {
        return Err(AppError::Corpus(format!(
            "Unsupported embedding store version {} (expected {})",
            store.version, STORE_VERSION
        )));
    }

    if store.dimensions == 0 {
        return Err(AppError::Corpus("Embedding store has zero dimensions".to_string()));
    }

    let mut seen = HashSet::new();
    for record in &store.embeddings {
        if record.vector.len() != store.dimensions {
            return Err(AppError::Corpus(format!(
                "Embedding for chunk '{}' has {} dimensions (store declares {})",
                record.chunk_id,
                record.vector.len(),
                store.dimensions
            )));
        }
        if !seen.insert(record.chunk_id.as_str()) {
            return Err(AppError::Corpus(format!(
                "Duplicate embedding for chunk '{}'",
                record.chunk_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn book() -> Book {
        Book {
            book_id: "embodied-mind".to_string(),
            title: "The Embodied Mind".to_string(),
            color_tag: Some("teal".to_string()),
        }
    }

    fn chunk(id: &str, position: u32) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            book_id: "embodied-mind".to_string(),
            text: "Consciousness arises from embodied interaction.".to_string(),
            chapter: Some("Ch. 2".to_string()),
            position,
            digest: "abc123def456".to_string(),
            word_count: 6,
        }
    }

    fn chunk_store() -> ChunkStoreFile {
        ChunkStoreFile {
            version: STORE_VERSION,
            built_at: Utc::now(),
            books: vec![book()],
            chunks: vec![chunk("embodied-mind:0000", 0), chunk("embodied-mind:0001", 1)],
        }
    }

    #[test]
    fn test_chunk_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");

        let store = chunk_store();
        save_chunk_store(&path, &store).unwrap();
        let loaded = load_chunk_store(&path).unwrap();

        assert_eq!(loaded.books, store.books);
        assert_eq!(loaded.chunks, store.chunks);
    }

    #[test]
    fn test_missing_store_is_not_loaded() {
        let temp = TempDir::new().unwrap();
        let err = load_chunk_store(&temp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AppError::IndexNotLoaded));
    }

    #[test]
    fn test_duplicate_chunk_ids_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");

        let mut store = chunk_store();
        store.chunks[1].chunk_id = store.chunks[0].chunk_id.clone();
        save_chunk_store(&path, &store).unwrap();

        let err = load_chunk_store(&path).unwrap_err();
        assert!(matches!(err, AppError::Corpus(_)));
    }

    #[test]
    fn test_dangling_book_reference_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");

        let mut store = chunk_store();
        store.chunks[0].book_id = "missing-book".to_string();
        save_chunk_store(&path, &store).unwrap();

        let err = load_chunk_store(&path).unwrap_err();
        assert!(matches!(err, AppError::Corpus(_)));
    }

    #[test]
    fn test_embedding_dimension_consistency_enforced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.json");

        let store = EmbeddingStoreFile {
            version: STORE_VERSION,
            model: "nomic-embed-text".to_string(),
            dimensions: 4,
            embeddings: vec![
                EmbeddingRecord {
                    chunk_id: "embodied-mind:0000".to_string(),
                    vector: vec![0.1, 0.2, 0.3, 0.4],
                },
                EmbeddingRecord {
                    chunk_id: "embodied-mind:0001".to_string(),
                    vector: vec![0.1, 0.2], // wrong length
                },
            ],
        };
        save_embedding_store(&path, &store).unwrap();

        let err = load_embedding_store(&path).unwrap_err();
        assert!(matches!(err, AppError::Corpus(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_chunk_store(&path).unwrap_err();
        assert!(matches!(err, AppError::Corpus(_)));
    }
}
