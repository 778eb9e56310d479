use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of a retrieval pair an embedding is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingTask {
    RetrievalDocument,
    RetrievalQuery,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: Option<u32>,
    pub response_mime_type: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerationConfig {
    pub fn max_tokens(max_output_tokens: u32) -> Self {
        Self {
            max_output_tokens: Some(max_output_tokens),
            ..Default::default()
        }
    }

    pub fn json() -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
}

/// One turn of a function-calling conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn function_response(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            parts: vec![Part::FunctionResponse {
                name: name.into(),
                response: serde_json::json!({ "content": content.into() }),
            }],
        }
    }
}

/// A tool the model may call. `parameters` is an OpenAPI-style schema object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    async fn generate_embedding(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;

    /// Produces the next model turn for `history`, optionally calling one of `tools`.
    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[ToolDeclaration],
        system_instruction: Option<&str>,
    ) -> Result<ChatMessage>;

    async fn get_model_info(&self) -> Result<String>;
}
