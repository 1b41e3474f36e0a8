//! Libris Corpus Library
//!
//! The retrieval-augmented answering core: splitting book text into
//! addressable chunks, indexing them for similarity search, ranking
//! candidates per query, and composing grounded answers with source
//! attribution.
//!
//! The index is built offline (`libris ingest`) and loaded at process start
//! as an immutable value; request handlers share it through an `Arc` and
//! never mutate it. The embedding and generation services are external
//! collaborators behind the `EmbeddingProvider` and `GenerationClient`
//! traits.

pub mod chunker;
pub mod embeddings;
pub mod facade;
pub mod index;
pub mod retriever;
pub mod store;
pub mod synthesizer;
pub mod types;

// Re-export commonly used types
pub use embeddings::EmbeddingProvider;
pub use facade::QueryFacade;
pub use index::EmbeddingIndex;
pub use retriever::Retriever;
pub use synthesizer::Synthesizer;
pub use types::{AnswerResult, Book, ChapterBoundary, Chunk, ScoredChunk, SourceRef};
