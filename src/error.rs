use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to read PDF: {0}")]
    Pdf(String),
    #[error("Extracted text is empty")]
    EmptyText,
    #[error("Invalid chunk configuration: {0}")]
    ChunkConfig(String),
}

/// Errors returned by the HTTP layer. The body is always `{"detail": ...}`
/// so clients have one field to surface.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect::<Vec<_>>();
        fields.sort();
        ApiError::Validation(format!("Invalid request fields: {}", fields.join(", ")))
    }
}
