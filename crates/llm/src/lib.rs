//! Libris LLM Library
//!
//! Text-generation collaborator for the answering core. Provides a unified
//! `GenerationClient` trait over concrete providers (Ollama, OpenAI) plus a
//! factory for creating clients from configuration.
//!
//! The core treats generation as a capability `generate(prompt) -> text`
//! that may fail transiently; providers map transport failures onto the
//! retryable `AppError` variants so the query façade can apply its backoff
//! policy.

pub mod client;
pub mod factory;
pub mod providers;

// Re-export commonly used types
pub use client::{GenerationClient, GenerationRequest, GenerationResponse, GenerationUsage};
pub use factory::create_client;
