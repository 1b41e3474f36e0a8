//! HTTP surface for the Libris book-QA service.
//!
//! Three endpoints over the shared façade and index:
//! - `POST /api/chat` answers a question with source citations
//! - `GET /api/books` lists the ingested books
//! - `GET /api/health` reports liveness and index shape
//!
//! Authentication and quota enforcement live upstream of this service, so
//! requests reaching these handlers are already entitled to query.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use libris_core::{AppError, AppResult};
use libris_corpus::{EmbeddingIndex, QueryFacade};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub facade: QueryFacade,
    pub index: Arc<EmbeddingIndex>,
    pub generation_provider: String,
    pub generation_model: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,

    /// Restrict retrieval to a single book id
    #[serde(default)]
    pub book_filter: Option<String>,
}

/// One book entry in `GET /api/books`.
#[derive(Debug, Serialize)]
pub struct BookEntry {
    pub book_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_tag: Option<String>,
    pub chunks: usize,
}

/// Build the service router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/books", get(books_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Bind and run the server until the process is terminated.
pub async fn serve(state: Arc<AppState>, port: u16) -> AppResult<()> {
    let (_, server_future) = serve_with_addr(state, port).await?;
    server_future.await
}

/// Bind the listener and return the bound address plus the server future.
///
/// Splitting bind from run lets callers use port 0 and discover the port the
/// OS assigned.
pub async fn serve_with_addr(
    state: Arc<AppState>,
    port: u16,
) -> AppResult<(
    std::net::SocketAddr,
    impl std::future::Future<Output = AppResult<()>>,
)> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::Config(format!("Failed to read local addr: {}", e)))?;

    info!("Libris server listening on http://{}", local_addr);

    let server_future = async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| AppError::Other(format!("Server error: {}", e)))?;
        Ok(())
    };

    Ok((local_addr, server_future))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let result = state
        .facade
        .answer(&request.question, true, request.book_filter.as_deref())
        .await;

    match result {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn books_handler(State(state): State<Arc<AppState>>) -> Response {
    let books: Vec<BookEntry> = state
        .index
        .books()
        .iter()
        .map(|b| BookEntry {
            book_id: b.book_id.clone(),
            title: b.title.clone(),
            color_tag: b.color_tag.clone(),
            chunks: state.index.chunk_count(&b.book_id),
        })
        .collect();

    (StatusCode::OK, Json(json!({ "books": books }))).into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let body = json!({
        "status": "ok",
        "books": state.index.books().len(),
        "chunks": state.index.len(),
        "embedding_model": state.index.model(),
        "generation_provider": state.generation_provider,
        "generation_model": state.generation_model,
        "index_built_at": state.index.built_at().to_rfc3339(),
    });

    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(error: AppError) -> Response {
    let status = match &error {
        AppError::AccessDenied => StatusCode::FORBIDDEN,
        e if e.is_input_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", error);
    }

    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::AppResult;
    use libris_corpus::embeddings::providers::mock::MockEmbedder;
    use libris_corpus::{Book, Chunk, Retriever, Synthesizer};
    use libris_llm::{GenerationClient, GenerationRequest, GenerationResponse, GenerationUsage};
    use std::time::Duration;

    const DIMS: usize = 128;

    #[derive(Debug)]
    struct StubClient;

    #[async_trait::async_trait]
    impl GenerationClient for StubClient {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: &GenerationRequest) -> AppResult<GenerationResponse> {
            Ok(GenerationResponse {
                content: "The library suggests cognition is embodied.".to_string(),
                model: request.model.clone(),
                usage: GenerationUsage::new(10, 10),
            })
        }
    }

    fn chunk(book_id: &str, position: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{}:{:04}", book_id, position),
            book_id: book_id.to_string(),
            text: text.to_string(),
            chapter: Some("Ch. 1".to_string()),
            position,
            digest: format!("{:012x}", position),
            word_count: text.split_whitespace().count() as u32,
        }
    }

    async fn test_state() -> Arc<AppState> {
        let books = vec![Book {
            book_id: "embodied-mind".to_string(),
            title: "The Embodied Mind".to_string(),
            color_tag: Some("teal".to_string()),
        }];
        let chunks = vec![
            chunk(
                "embodied-mind",
                0,
                "Cognition emerges through embodied interaction with the world.",
            ),
            chunk(
                "embodied-mind",
                1,
                "Perception and action form one continuous loop.",
            ),
        ];

        let embedder = MockEmbedder::new(DIMS);
        let index = Arc::new(EmbeddingIndex::build(books, chunks, &embedder).await.unwrap());

        let retriever = Arc::new(
            Retriever::new(index.clone(), Arc::new(MockEmbedder::new(DIMS)), 3, 0.05).unwrap(),
        );
        let synthesizer = Arc::new(Synthesizer::new(
            Arc::new(StubClient),
            "test-model".to_string(),
            index.clone(),
            6000,
        ));
        let facade = QueryFacade::new(retriever, synthesizer, 2, Duration::from_secs(30));

        Arc::new(AppState {
            facade,
            index,
            generation_provider: "stub".to_string(),
            generation_model: "test-model".to_string(),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_returns_answer_with_sources() {
        let state = test_state().await;
        let request = ChatRequest {
            question: "How does embodied interaction shape cognition?".to_string(),
            book_filter: None,
        };

        let response = chat_handler(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["answer"].as_str().unwrap().contains("embodied"));
        let sources = body["sources"].as_array().unwrap();
        assert!(!sources.is_empty());
        assert_eq!(sources[0]["book_title"], "The Embodied Mind");
    }

    #[tokio::test]
    async fn test_chat_blank_question_is_bad_request() {
        let state = test_state().await;
        let request = ChatRequest {
            question: "   ".to_string(),
            book_filter: None,
        };

        let response = chat_handler(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid query"));
    }

    #[tokio::test]
    async fn test_chat_off_corpus_question_is_ok_with_apology() {
        let state = test_state().await;
        let request = ChatRequest {
            question: "quarterly tax filing deadlines".to_string(),
            book_filter: None,
        };

        let response = chat_handler(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["sources"].as_array().unwrap().is_empty());
        assert!(body["answer"]
            .as_str()
            .unwrap()
            .contains("could not find anything"));
    }

    #[tokio::test]
    async fn test_books_lists_corpus() {
        let state = test_state().await;
        let response = books_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let books = body["books"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0]["book_id"], "embodied-mind");
        assert_eq!(books[0]["title"], "The Embodied Mind");
        assert_eq!(books[0]["color_tag"], "teal");
        assert_eq!(books[0]["chunks"], 2);
    }

    #[tokio::test]
    async fn test_health_reports_index_shape() {
        let state = test_state().await;
        let response = health_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["books"], 1);
        assert_eq!(body["chunks"], 2);
        assert_eq!(body["embedding_model"], "trigram-v1");
        assert_eq!(body["generation_provider"], "stub");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let forbidden = error_response(AppError::AccessDenied);
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let bad_request = error_response(AppError::InvalidQuery("empty".to_string()));
        assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);

        let internal = error_response(AppError::Corpus("broken store".to_string()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
