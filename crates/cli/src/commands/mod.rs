//! Command handlers for the Libris CLI.

pub mod ask;
pub mod books;
pub mod ingest;
pub mod serve;

pub use ask::AskCommand;
pub use books::BooksCommand;
pub use ingest::IngestCommand;
pub use serve::ServeCommand;

use libris_core::{config::AppConfig, AppError, AppResult};
use libris_corpus::{
    embeddings, EmbeddingIndex, QueryFacade, Retriever, Synthesizer,
};
use std::sync::Arc;
use std::time::Duration;

/// Load the persisted index, with an actionable hint when it is missing.
pub(crate) fn load_index(config: &AppConfig) -> AppResult<Arc<EmbeddingIndex>> {
    match EmbeddingIndex::load(&config.chunks_path(), &config.embeddings_path()) {
        Ok(index) => Ok(Arc::new(index)),
        Err(AppError::IndexNotLoaded) => Err(AppError::Config(format!(
            "No corpus found in {:?}. Run 'libris ingest --dir <books>' first.",
            config.libris_dir()
        ))),
        Err(e) => Err(e),
    }
}

/// Wire the full answering pipeline from configuration and a loaded index.
pub(crate) fn build_facade(
    config: &AppConfig,
    index: Arc<EmbeddingIndex>,
) -> AppResult<QueryFacade> {
    let embedder = embeddings::create_provider(&config.embedding)?;
    let retriever = Arc::new(Retriever::new(
        index.clone(),
        embedder,
        config.retrieval.top_k,
        config.retrieval.min_score,
    )?);

    let client = libris_llm::create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
        config.answering.request_timeout_secs,
    )?;
    let synthesizer = Arc::new(Synthesizer::new(
        client,
        config.model.clone(),
        index,
        config.answering.max_context_chars,
    ));

    Ok(QueryFacade::new(
        retriever,
        synthesizer,
        config.answering.max_retries,
        Duration::from_secs(config.answering.request_timeout_secs),
    ))
}
