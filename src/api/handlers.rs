use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use tracing::{error, info, warn};

use super::extract::{CurrentUser, ValidatedJson};
use super::AppState;
use crate::database::NewDocument;
use crate::document::{is_pdf_filename, locate_entities};
use crate::error::ApiError;
use crate::models::{
    AgentQueryRequest, AgentQueryResponse, AnswerResponse, DocumentDetails, DocumentListItem,
    QuestionRequest, SearchResponse, SemanticSearchRequest, StatusResponse, UploadPdfResponse,
};

pub const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information in the document to \
                                     answer your question. Please try rephrasing or asking a \
                                     different question.";
pub const NO_SEARCH_RESULTS: &str = "No relevant results found for your query in this document.";

const PREVIEW_CHUNKS: usize = 10;
const PREVIEW_MAX_CHARS: usize = 20_000;

/// Logs the failure and wraps it as a 500 with `context` in front.
fn internal(context: &'static str) -> impl Fn(anyhow::Error) -> ApiError {
    move |e| {
        error!("{context}: {e:#}");
        ApiError::Internal(format!("{context}: {e}"))
    }
}

pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
        test_response: None,
    })
}

pub async fn check_gemini(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let result = match state.analyzer.check().await {
        Ok(reply) if !reply.is_empty() => Ok(reply),
        Ok(_) => Err(anyhow::anyhow!(
            "Gemini API returned an empty or unexpected response."
        )),
        Err(e) => Err(e),
    };

    match result {
        Ok(reply) => Ok(Json(StatusResponse {
            status: "ok".to_string(),
            message: Some("Gemini API is working correctly.".to_string()),
            test_response: Some(reply),
        })),
        Err(e) => {
            error!("Gemini API check failed: {e}");
            Err(ApiError::Internal(format!(
                "Gemini API check failed: {e}. Please check your API key and network connection."
            )))
        }
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<DocumentListItem>>, ApiError> {
    let documents = state
        .db
        .get_user_documents(&user_id)
        .await
        .map_err(|e| internal("Failed to retrieve documents")(e.into()))?;
    Ok(Json(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentDetails>, ApiError> {
    let record = state
        .db
        .get_document(&document_id)
        .await
        .map_err(|e| internal("Failed to fetch document details")(e.into()))?
        .ok_or_else(|| ApiError::NotFound(format!("Document {document_id} not found")))?;

    let mut extracted_text = record.content.unwrap_or_default();
    if extracted_text.is_empty() {
        // Older rows have no stored text; rebuild a preview from the chunks.
        match state.db.get_document_chunks(&document_id, PREVIEW_CHUNKS).await {
            Ok(chunks) => {
                extracted_text = chunks
                    .join("\n\n")
                    .chars()
                    .take(PREVIEW_MAX_CHARS)
                    .collect();
            }
            Err(e) => warn!("failed to assemble preview from chunks: {e}"),
        }
    }

    Ok(Json(DocumentDetails {
        id: record.id,
        filename: record.filename,
        extracted_text,
        summary: record.summary.unwrap_or_default(),
        entities: record.entities,
    }))
}

pub async fn upload_pdf(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadPdfResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::Validation("Missing 'file' field.".to_string()));
    };
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No file name provided.".to_string()))?;
    if !is_pdf_filename(&filename) {
        return Err(ApiError::BadRequest("Only PDF files are allowed.".to_string()));
    }

    info!(%filename, size = bytes.len(), "processing upload");
    process_upload(&state, &user_id, &filename, bytes.to_vec())
        .await
        .map(Json)
        .map_err(internal("Failed to process PDF"))
}

async fn process_upload(
    state: &AppState,
    user_id: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> anyhow::Result<UploadPdfResponse> {
    let text = state.processor.extract_clean_text(bytes.clone()).await?;
    let storage_path = state.storage.upload_pdf(filename, &bytes, user_id).await?;

    let (summary, candidates) = tokio::join!(
        state.analyzer.generate_summary(&text),
        state.analyzer.extract_entities(&text)
    );
    let entities = locate_entities(&text, candidates);

    let document_id = state
        .db
        .insert_document(NewDocument {
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            storage_path,
            summary: summary.clone(),
            entities: entities.clone(),
            content: Some(text.clone()),
        })
        .await?;

    let chunks = state.processor.chunk(&text);
    let indexed = state.search.index_document(&document_id, chunks).await?;
    info!(%document_id, chunks = indexed, entities = entities.len(), "document processed");

    Ok(UploadPdfResponse {
        document_id,
        extracted_text: text,
        summary,
        entities,
    })
}

pub async fn ask_question(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ValidatedJson(request): ValidatedJson<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let fail = internal("Failed to answer question");

    let chunks = state
        .search
        .relevant_chunks(&request.document_id, &request.question, state.retrieval.qa_top_k)
        .await
        .map_err(&fail)?;

    if chunks.is_empty() {
        return Ok(Json(AnswerResponse {
            answer: NO_CONTEXT_ANSWER.to_string(),
        }));
    }

    let context = chunks.join("\n\n");
    let answer = state.analyzer.generate_answer(&request.question, &context).await;

    state
        .db
        .save_conversation(&user_id, &request.document_id, &request.question, &answer)
        .await
        .map_err(|e| fail(e.into()))?;

    Ok(Json(AnswerResponse { answer }))
}

pub async fn semantic_search(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    ValidatedJson(request): ValidatedJson<SemanticSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let chunks = state
        .search
        .relevant_chunks(&request.document_id, &request.query, state.retrieval.search_top_k)
        .await
        .map_err(internal("Failed to perform semantic search"))?;

    let results = if chunks.is_empty() {
        vec![NO_SEARCH_RESULTS.to_string()]
    } else {
        chunks
    };
    Ok(Json(SearchResponse { results }))
}

pub async fn agent_query(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ValidatedJson(request): ValidatedJson<AgentQueryRequest>,
) -> Result<Json<AgentQueryResponse>, ApiError> {
    let fail = internal("Failed to process agent query");

    let response = state
        .agent
        .invoke(&request.document_id, &request.query)
        .await
        .map_err(&fail)?;

    state
        .db
        .save_conversation(&user_id, &request.document_id, &request.query, &response.answer)
        .await
        .map_err(|e| fail(e.into()))?;

    Ok(Json(response))
}
