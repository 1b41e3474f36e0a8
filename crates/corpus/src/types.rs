//! Corpus type definitions.

use serde::{Deserialize, Serialize};

/// A book in the corpus. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    /// Stable slug identifying the book (e.g., "embodied-mind")
    pub book_id: String,

    /// Display title (e.g., "The Embodied Mind")
    pub title: String,

    /// Cosmetic display hint for the UI layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_tag: Option<String>,
}

/// A chapter boundary within a book's raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterBoundary {
    /// Byte offset into the raw text where the chapter starts
    pub offset: usize,

    /// Chapter label (e.g., "Ch. 2")
    pub title: String,
}

/// The atomic retrievable unit: a bounded passage of book text.
///
/// Created once by the chunker, never mutated afterwards. `chunk_id` is a
/// deterministic function of `book_id` and `position` so rebuilds are
/// reproducible when the source text is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique chunk identifier, stable across rebuilds
    pub chunk_id: String,

    /// Owning book
    pub book_id: String,

    /// Passage content, non-empty, bounded by the chunk window
    pub text: String,

    /// Chapter label, if the passage falls inside a detected chapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    /// Ordinal within the book
    pub position: u32,

    /// Truncated SHA-256 of the text, for rebuild reproducibility checks
    pub digest: String,

    /// Word count, retained for quality diagnostics
    pub word_count: u32,
}

/// A retrieved chunk paired with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A citation in an answer: where a grounded passage came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// Display title of the source book
    pub book_title: String,

    /// Chapter label, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    /// Cosine similarity of the cited passage to the query
    pub similarity: f32,
}

/// Result of answering a question.
///
/// `sources` lists exactly the passages that were passed to the generation
/// prompt, in retrieval order. The internal fields are not serialized; they
/// let callers and tests distinguish degraded responses from grounded ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Natural language answer
    pub answer: String,

    /// Citations for the passages that grounded the answer
    pub sources: Vec<SourceRef>,

    /// Internal: highest similarity score from retrieval
    #[serde(skip)]
    pub max_score: f32,

    /// Internal: whether this is an apology/fallback response
    #[serde(skip)]
    pub degraded: bool,
}

impl AnswerResult {
    /// Create a grounded answer.
    pub fn new(answer: String, sources: Vec<SourceRef>, max_score: f32) -> Self {
        Self {
            answer,
            sources,
            max_score,
            degraded: false,
        }
    }

    /// Response when no passage cleared the relevance floor.
    pub fn no_relevant_content(question: &str) -> Self {
        Self {
            answer: format!(
                "I could not find anything in the books that speaks to \"{}\". \
                 Try asking about the themes the books actually explore.",
                question.trim()
            ),
            sources: Vec::new(),
            max_score: 0.0,
            degraded: true,
        }
    }

    /// Apology response after the generation collaborator stayed unavailable
    /// through every retry.
    pub fn generation_degraded() -> Self {
        Self {
            answer: "I'm sorry, I wasn't able to put together an answer just now. \
                     Please try again in a moment."
                .to_string(),
            sources: Vec::new(),
            max_score: 0.0,
            degraded: true,
        }
    }

    /// Apology response when the overall request deadline elapsed.
    pub fn timed_out() -> Self {
        Self {
            answer: "That question took longer than I can spend on a single answer. \
                     Please try again."
                .to_string(),
            sources: Vec::new(),
            max_score: 0.0,
            degraded: true,
        }
    }
}
