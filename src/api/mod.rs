use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod extract;
mod handlers;

pub use extract::{CurrentUser, ValidatedJson};

use crate::config::{RetrievalConfig, ServerConfig};
use crate::database::Database;
use crate::document::DocumentProcessor;
use crate::llm::{DocumentAgent, DocumentAnalyzer, EmbeddingGenerator, SemanticSearch};
use crate::providers::traits::CompletionProvider;
use crate::storage::PdfStorage;

#[derive(Clone)]
pub struct AppState {
    db: Database,
    storage: PdfStorage,
    processor: DocumentProcessor,
    analyzer: DocumentAnalyzer,
    search: SemanticSearch,
    agent: Arc<DocumentAgent>,
    retrieval: RetrievalConfig,
    user_id: Option<String>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        db: Database,
        storage: PdfStorage,
        processor: DocumentProcessor,
        config: &ServerConfig,
    ) -> Self {
        let retrieval = config.retrieval.clone();
        let embeddings = Arc::new(EmbeddingGenerator::new(
            Arc::clone(&provider),
            config.embedding_cache,
            retrieval.embedding_concurrency,
        ));
        let search = SemanticSearch::new(db.clone(), embeddings);
        let agent = DocumentAgent::new(
            Arc::clone(&provider),
            db.clone(),
            search.clone(),
            retrieval.agent_top_k,
        );

        Self {
            db,
            storage,
            processor,
            analyzer: DocumentAnalyzer::new(provider),
            search,
            agent: Arc::new(agent),
            retrieval,
            user_id: config.user_id.clone(),
        }
    }
}

/// Create and configure the API router
pub fn create_api(state: AppState, config: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    info!(origins = ?config.cors_origins, "CORS configured");

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/check-gemini", get(handlers::check_gemini))
        .route("/documents", get(handlers::list_documents))
        .route("/documents/:document_id", get(handlers::get_document))
        .route("/upload-pdf", post(handlers::upload_pdf))
        .route("/ask-question", post(handlers::ask_question))
        .route("/semantic-search", post(handlers::semantic_search))
        .route("/agent-query", post(handlers::agent_query))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewChunk, NewDocument};
    use crate::document::ChunkConfig;
    use crate::providers::traits::{ChatMessage, Part, Role};
    use crate::testing::{bag_of_words, ScriptedProvider, Utf8Extractor};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const LEASE: &str = "ACME Corp leases the warehouse to Jane Doe.\n\n\
                         Rent is due on the first day of each month.\n\
                         Late fees are fifty dollars after five days.";

    struct Harness {
        router: Router,
        db: Database,
        provider: Arc<ScriptedProvider>,
        storage_dir: TempDir,
    }

    async fn harness_with(provider: ScriptedProvider, user_id: Option<&str>) -> Harness {
        let storage_dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::from_lookup(|_| None).unwrap();
        config.user_id = user_id.map(str::to_string);
        config.storage_dir = storage_dir.path().to_path_buf();

        let provider = Arc::new(provider);
        let db = Database::in_memory().await.unwrap();
        let processor = DocumentProcessor::new(Arc::new(Utf8Extractor), ChunkConfig::default());
        let state = AppState::new(
            provider.clone(),
            db.clone(),
            PdfStorage::new(&config.storage_dir),
            processor,
            &config,
        );

        Harness {
            router: create_api(state, &config),
            db,
            provider,
            storage_dir,
        }
    }

    async fn harness() -> Harness {
        harness_with(ScriptedProvider::new(), Some("user-1")).await
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(filename: Option<&str>, content: &str) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"file\"; filename=\"{name}\""),
            None => "form-data; name=\"file\"".to_string(),
        };
        let body = format!(
            "--BOUNDARY\r\n\
             Content-Disposition: {disposition}\r\n\
             Content-Type: application/pdf\r\n\r\n\
             {content}\r\n\
             --BOUNDARY--\r\n"
        );
        Request::post("/upload-pdf")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    async fn uploaded(h: &Harness) -> String {
        let (status, body) = send(&h.router, upload(Some("lease.pdf"), LEASE)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["document_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_needs_no_user() {
        let h = harness_with(ScriptedProvider::new(), None).await;
        let (status, body) = send(&h.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn missing_user_is_a_server_error() {
        let h = harness_with(ScriptedProvider::new(), None).await;
        let (status, body) = send(&h.router, get("/documents")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["detail"],
            "DUMMY_USER_ID not set in .env for testing. Please configure it."
        );
    }

    #[tokio::test]
    async fn same_name_uploads_keep_separate_files() {
        let h = harness().await;

        let (status, first) =
            send(&h.router, upload(Some("lease.pdf"), "First version of the lease.")).await;
        assert_eq!(status, StatusCode::OK, "{first}");
        let (status, second) =
            send(&h.router, upload(Some("lease.pdf"), "Second, different contract.")).await;
        assert_eq!(status, StatusCode::OK, "{second}");

        let first = h
            .db
            .get_document(first["document_id"].as_str().unwrap())
            .await
            .unwrap()
            .unwrap();
        let second = h
            .db
            .get_document(second["document_id"].as_str().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.storage_path, second.storage_path);
        assert_eq!(first.filename, "lease.pdf");
        assert_eq!(second.filename, "lease.pdf");

        let stored =
            |path: &str| std::fs::read_to_string(h.storage_dir.path().join(path)).unwrap();
        assert_eq!(stored(&first.storage_path), "First version of the lease.");
        assert_eq!(stored(&second.storage_path), "Second, different contract.");
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_and_nameless_files() {
        let h = harness().await;

        let (status, body) = send(&h.router, upload(Some("notes.txt"), "hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Only PDF files are allowed.");

        let (status, body) = send(&h.router, upload(None, "hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No file name provided.");

        let (_, listed) = send(&h.router, get("/documents")).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn upload_processes_and_lists_document() {
        let h = harness().await;
        let (status, body) = send(&h.router, upload(Some("Lease.PDF"), LEASE)).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let expected_text = LEASE.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(body["extracted_text"], expected_text.as_str());
        assert_eq!(body["summary"], "Scripted summary.");
        assert_eq!(
            body["entities"],
            json!([{"text": "ACME", "label": "ORG", "start": 0, "end": 4}])
        );

        let id = body["document_id"].as_str().unwrap();
        let (_, listed) = send(&h.router, get("/documents")).await;
        assert_eq!(listed, json!([{"id": id, "filename": "Lease.PDF"}]));

        let (status, details) = send(&h.router, get(&format!("/documents/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["extracted_text"], expected_text.as_str());
        assert_eq!(details["summary"], "Scripted summary.");
        assert_eq!(details["entities"][0]["label"], "ORG");
    }

    #[tokio::test]
    async fn failed_extraction_reports_processing_error() {
        let h = harness().await;
        let (status, body) = send(&h.router, upload(Some("blank.pdf"), "   ")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to process PDF: "));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let h = harness().await;
        let (status, body) = send(&h.router, get("/documents/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Document nope not found");
    }

    #[tokio::test]
    async fn details_fall_back_to_chunk_preview() {
        let h = harness().await;
        let id = h
            .db
            .insert_document(NewDocument {
                user_id: "user-1".to_string(),
                filename: "old.pdf".to_string(),
                storage_path: "documents/user-1/old.pdf".to_string(),
                summary: String::new(),
                entities: Vec::new(),
                content: None,
            })
            .await
            .unwrap();
        h.db.insert_document_chunks(
            &id,
            vec![
                NewChunk {
                    chunk_index: 1,
                    chunk_text: "second".to_string(),
                    embedding: bag_of_words("second"),
                },
                NewChunk {
                    chunk_index: 0,
                    chunk_text: "first".to_string(),
                    embedding: bag_of_words("first"),
                },
            ],
        )
        .await
        .unwrap();

        let (status, details) = send(&h.router, get(&format!("/documents/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["extracted_text"], "first\n\nsecond");
        assert_eq!(details["summary"], "");
        assert_eq!(details["entities"], json!([]));
    }

    #[tokio::test]
    async fn ask_answers_from_context_and_saves_conversation() {
        let h = harness().await;
        let id = uploaded(&h).await;

        let (status, body) = send(
            &h.router,
            post_json("/ask-question", json!({"document_id": id, "question": "How much are late fees?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Scripted answer.");
        assert_eq!(h.db.conversation_count(&id).await.unwrap(), 1);

        let prompt = h.provider.prompts().pop().unwrap();
        assert!(prompt.contains("Late fees are fifty dollars"));
    }

    #[tokio::test]
    async fn ask_without_chunks_returns_fixed_answer() {
        let h = harness().await;
        let (status, body) = send(
            &h.router,
            post_json("/ask-question", json!({"document_id": "empty", "question": "Anything?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], handlers::NO_CONTEXT_ANSWER);
        assert_eq!(h.db.conversation_count("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_fields_fail_validation() {
        let h = harness().await;
        let (status, body) = send(
            &h.router,
            post_json("/ask-question", json!({"document_id": "doc", "question": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("question"));

        let (status, _) = send(&h.router, post_json("/semantic-search", json!({"query": "x"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn semantic_search_returns_chunks_or_placeholder() {
        let h = harness().await;
        let id = uploaded(&h).await;

        let (status, body) = send(
            &h.router,
            post_json("/semantic-search", json!({"document_id": id, "query": "late fees"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);

        let (_, empty) = send(
            &h.router,
            post_json("/semantic-search", json!({"document_id": "none", "query": "late fees"})),
        )
        .await;
        assert_eq!(empty["results"], json!([handlers::NO_SEARCH_RESULTS]));
    }

    #[tokio::test]
    async fn embedding_failure_is_a_server_error() {
        let h = harness_with(ScriptedProvider::new().fail_embeddings(), Some("user-1")).await;
        let (status, body) = send(
            &h.router,
            post_json("/semantic-search", json!({"document_id": "doc", "query": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to perform semantic search: "));
    }

    #[tokio::test]
    async fn agent_query_runs_tools_and_saves_answer() {
        let turns = vec![
            ChatMessage {
                role: Role::Model,
                parts: vec![Part::FunctionCall {
                    name: "semantic_search_document".to_string(),
                    args: json!({"query": "late fees"}),
                }],
            },
            ChatMessage {
                role: Role::Model,
                parts: vec![Part::Text("Fifty dollars.".to_string())],
            },
        ];
        let h = harness_with(ScriptedProvider::new().with_turns(turns), Some("user-1")).await;
        let id = uploaded(&h).await;

        let (status, body) = send(
            &h.router,
            post_json("/agent-query", json!({"document_id": id, "query": "Late fees?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["answer"], "Fifty dollars.");
        assert_eq!(body["tool_calls"][0]["tool"], "semantic_search_document");
        assert_eq!(body["tool_calls"][0]["args"]["document_id"], id.as_str());
        assert!(body["final_prompt"]
            .as_str()
            .unwrap()
            .contains("Relevant sections:"));
        assert_eq!(h.db.conversation_count(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn agent_provider_failure_is_a_server_error() {
        let h = harness().await;
        let (status, body) = send(
            &h.router,
            post_json("/agent-query", json!({"document_id": "doc", "query": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to process agent query: "));
    }

    #[tokio::test]
    async fn check_gemini_reports_status() {
        let h = harness_with(ScriptedProvider::new(), None).await;
        let (status, body) = send(&h.router, get("/check-gemini")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Gemini API is working correctly.");
        assert_eq!(body["test_response"], "Hello");

        let broken = harness_with(ScriptedProvider::new().fail_completions(), None).await;
        let (status, body) = send(&broken.router, get("/check-gemini")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .ends_with("Please check your API key and network connection."));
    }
}
