//! The question-answering façade.
//!
//! Single entry point for answering a reader's question: validates input,
//! runs retrieval and synthesis with retries for transient collaborator
//! failures, and enforces an overall deadline. Degraded outcomes (nothing
//! relevant, generation down, deadline elapsed) are successful responses
//! with apology text, not errors; only caller mistakes and corpus integrity
//! problems surface as `Err`.

use crate::retriever::Retriever;
use crate::synthesizer::Synthesizer;
use crate::types::AnswerResult;
use libris_core::{AppError, AppResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const INITIAL_BACKOFF_MS: u64 = 100;

pub struct QueryFacade {
    retriever: Arc<Retriever>,
    synthesizer: Arc<Synthesizer>,
    max_retries: u32,
    request_timeout: Duration,
}

impl QueryFacade {
    pub fn new(
        retriever: Arc<Retriever>,
        synthesizer: Arc<Synthesizer>,
        max_retries: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            max_retries,
            request_timeout,
        }
    }

    /// Answer a question against the corpus.
    ///
    /// `access_ok` is the caller's entitlement decision; `false` is refused
    /// before any work happens. An empty question is `InvalidQuery`. The
    /// whole pipeline runs under the configured deadline; if it elapses the
    /// reader gets a timeout apology rather than a hung request.
    pub async fn answer(
        &self,
        question: &str,
        access_ok: bool,
        book_filter: Option<&str>,
    ) -> AppResult<AnswerResult> {
        if !access_ok {
            return Err(AppError::AccessDenied);
        }

        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidQuery(
                "Question must not be empty".to_string(),
            ));
        }

        match tokio::time::timeout(
            self.request_timeout,
            self.answer_inner(question, book_filter),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Request exceeded the {}s deadline",
                    self.request_timeout.as_secs()
                );
                Ok(AnswerResult::timed_out())
            }
        }
    }

    async fn answer_inner(
        &self,
        question: &str,
        book_filter: Option<&str>,
    ) -> AppResult<AnswerResult> {
        let retrieved = match self
            .with_retries("retrieval", || {
                self.retriever.retrieve(question, None, book_filter)
            })
            .await
        {
            Ok(chunks) => chunks,
            Err(AppError::NoResults) => {
                info!("No passages cleared the relevance floor");
                return Ok(AnswerResult::no_relevant_content(question));
            }
            Err(e) if e.is_retryable() => {
                warn!("Retrieval stayed unavailable through retries: {}", e);
                return Ok(AnswerResult::generation_degraded());
            }
            Err(e) => return Err(e),
        };

        match self
            .with_retries("synthesis", || {
                self.synthesizer.synthesize(question, &retrieved)
            })
            .await
        {
            Ok(result) => Ok(result),
            Err(e) if e.is_retryable() => {
                warn!("Generation stayed unavailable through retries: {}", e);
                Ok(AnswerResult::generation_degraded())
            }
            Err(e) => Err(e),
        }
    }

    /// Run an operation, retrying transient failures with exponential
    /// backoff. Non-retryable errors pass through on the first occurrence.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        what,
                        attempt,
                        self.max_retries + 1,
                        backoff_ms,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
