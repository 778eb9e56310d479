//! Request and response shapes shared by the HTTP service and the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 128), custom = "not_blank")]
    pub document_id: String,
    #[validate(length(min = 1, max = 4000), custom = "not_blank")]
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SemanticSearchRequest {
    #[validate(length(min = 1, max = 128), custom = "not_blank")]
    pub document_id: String,
    #[validate(length(min = 1, max = 4000), custom = "not_blank")]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentQueryRequest {
    #[validate(length(min = 1, max = 128), custom = "not_blank")]
    pub document_id: String,
    #[validate(length(min = 1, max = 4000), custom = "not_blank")]
    pub query: String,
}

/// A named entity. `start`/`end` are character offsets into the extracted
/// text (end exclusive) and are absent when the text was not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

impl Entity {
    pub fn span(&self) -> Option<(usize, usize)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPdfResponse {
    pub document_id: String,
    pub extracted_text: String,
    pub summary: String,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentListItem {
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetails {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentQueryResponse {
    pub answer: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(default)]
    pub final_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_response: Option<String>,
}
