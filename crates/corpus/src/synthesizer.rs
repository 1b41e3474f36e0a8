//! Grounded answer synthesis.
//!
//! Turns retrieved passages into a natural language answer through the
//! generation collaborator. The prompt explicitly instructs the model to
//! answer only from the supplied passages, and every passage that made it
//! into the prompt is cited back to the caller as a source.

use crate::index::EmbeddingIndex;
use crate::types::{AnswerResult, ScoredChunk, SourceRef};
use libris_core::AppResult;
use libris_llm::{GenerationClient, GenerationRequest};
use std::sync::Arc;
use tracing::debug;

/// Below this top similarity score the answer gets hedged framing.
pub const CONFIDENCE_THRESHOLD: f32 = 0.30;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

/// Composes grounded answers from retrieved passages.
pub struct Synthesizer {
    client: Arc<dyn GenerationClient>,
    model: String,
    index: Arc<EmbeddingIndex>,
    max_context_chars: usize,
}

impl Synthesizer {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        model: String,
        index: Arc<EmbeddingIndex>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            client,
            model,
            index,
            max_context_chars,
        }
    }

    /// Generate an answer grounded in the given passages.
    ///
    /// `retrieved` must be non-empty and in descending score order, as the
    /// retriever produces it. Sources in the result correspond exactly to
    /// the passages that fit the context budget, in retrieval order.
    pub async fn synthesize(
        &self,
        question: &str,
        retrieved: &[ScoredChunk],
    ) -> AppResult<AnswerResult> {
        let max_score = retrieved.first().map(|s| s.score).unwrap_or(0.0);
        let included = self.fit_to_budget(retrieved);
        let context = self.build_context(&included);

        debug!(
            "Synthesizing from {}/{} passages ({} chars of context)",
            included.len(),
            retrieved.len(),
            context.len()
        );

        let request = GenerationRequest::new(build_user_prompt(question, &context), &self.model)
            .with_system(build_system_prompt(max_score))
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let response = self.client.complete(&request).await?;

        let sources = included
            .iter()
            .map(|s| SourceRef {
                book_title: self
                    .index
                    .book_title(&s.chunk.book_id)
                    .unwrap_or(&s.chunk.book_id)
                    .to_string(),
                chapter: s.chunk.chapter.clone(),
                similarity: s.score,
            })
            .collect();

        Ok(AnswerResult::new(
            response.content.trim().to_string(),
            sources,
            max_score,
        ))
    }

    /// Select the passages that fit the context budget.
    ///
    /// Passages are kept from the highest-scoring end; whole passages are
    /// dropped from the tail once the budget is spent. If even the single
    /// best passage exceeds the budget it is truncated rather than dropped,
    /// so the prompt is never empty.
    fn fit_to_budget(&self, retrieved: &[ScoredChunk]) -> Vec<ScoredChunk> {
        let mut included = Vec::new();
        let mut used = 0usize;

        for scored in retrieved {
            let len = scored.chunk.text.len();
            if used + len <= self.max_context_chars {
                included.push(scored.clone());
                used += len;
            } else if included.is_empty() {
                let mut truncated = scored.clone();
                truncated.chunk.text = truncate_at_char_boundary(
                    &scored.chunk.text,
                    self.max_context_chars.saturating_sub(3),
                );
                truncated.chunk.text.push_str("...");
                included.push(truncated);
                break;
            } else {
                break;
            }
        }

        included
    }

    fn build_context(&self, included: &[ScoredChunk]) -> String {
        let mut context = String::new();
        for scored in included {
            let title = self
                .index
                .book_title(&scored.chunk.book_id)
                .unwrap_or(&scored.chunk.book_id);

            match &scored.chunk.chapter {
                Some(chapter) => {
                    context.push_str(&format!("From '{}' ({}):\n", title, chapter));
                }
                None => {
                    context.push_str(&format!("From '{}':\n", title));
                }
            }
            context.push_str(&scored.chunk.text);
            context.push_str("\n\n");
        }
        context
    }
}

fn build_system_prompt(max_score: f32) -> String {
    let mut prompt = String::from(
        "You are a thoughtful reading companion for a small personal library. \
         Answer the reader's question using ONLY the provided passages. \
         Do not draw on outside knowledge. \
         If the passages do not contain enough to answer, say so plainly. \
         Keep answers concise and conversational, and refer to the books by title \
         when it helps.",
    );

    if max_score < CONFIDENCE_THRESHOLD {
        prompt.push_str(
            "\n\nThe passages below are only loosely related to the question. \
             Begin your answer by noting that the books touch on this only indirectly, \
             then share what they do say.",
        );
    }

    prompt
}

fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Passages from the library:\n\n{}Question: {}",
        context, question
    )
}

/// Cut `text` to at most `max_bytes`, backing up to a char boundary.
fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
