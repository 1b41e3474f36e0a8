//! Embedding providers.
//!
//! The corpus never computes vectors itself. Everything that needs an
//! embedding goes through the [`EmbeddingProvider`] trait, so the index and
//! retriever are testable against the deterministic mock provider and run
//! against Ollama in production.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
