//! Wire format of the Gemini `generateContent` and `embedContent` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::traits::{ChatMessage, GenerationConfig, Part, Role, ToolDeclaration};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, empty when the model returned nothing.
    pub fn into_first_parts(self) -> Vec<WirePart> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedContentRequest {
    pub model: String,
    pub content: Content,
    pub task_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedContentResponse {
    pub embedding: ContentEmbedding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![WirePart {
                text: Some(text.into()),
                ..Default::default()
            }],
        }
    }
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            response_mime_type: config.response_mime_type.clone(),
            temperature: config.temperature,
        }
    }
}

impl From<&ToolDeclaration> for FunctionDeclaration {
    fn from(tool: &ToolDeclaration) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        }
    }
}

impl From<&ChatMessage> for Content {
    fn from(message: &ChatMessage) -> Self {
        // Function results travel back to the model in a user turn.
        let role = match message.role {
            Role::Model => "model",
            Role::User | Role::Function => "user",
        };
        let parts = message
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                Part::FunctionCall { name, args } => WirePart {
                    function_call: Some(FunctionCall {
                        name: name.clone(),
                        args: args.clone(),
                    }),
                    ..Default::default()
                },
                Part::FunctionResponse { name, response } => WirePart {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: response.clone(),
                    }),
                    ..Default::default()
                },
            })
            .collect();
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

impl WirePart {
    /// Maps a wire part onto a chat part; parts with no payload are dropped.
    pub fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            let args = if call.args.is_null() {
                Value::Object(Default::default())
            } else {
                call.args
            };
            return Some(Part::FunctionCall {
                name: call.name,
                args,
            });
        }
        if let Some(response) = self.function_response {
            return Some(Part::FunctionResponse {
                name: response.name,
                response: response.response,
            });
        }
        self.text.map(Part::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "hi")],
            system_instruction: None,
            tools: None,
            generation_config: Some((&GenerationConfig::max_tokens(250)).into()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 250);
        assert!(value.get("tools").is_none());
        assert!(value["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn function_response_turn_uses_user_role() {
        let content = Content::from(&ChatMessage::function_response("get_document_summary", "text"));
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["parts"][0]["functionResponse"]["name"], "get_document_summary");
        assert_eq!(value["parts"][0]["functionResponse"]["response"]["content"], "text");
    }

    #[test]
    fn response_parts_convert_to_chat_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "semantic_search_document", "args": {"query": "fees"}}},
                        {"text": "done"}
                    ]
                }
            }]
        }))
        .unwrap();

        let parts: Vec<Part> = response
            .into_first_parts()
            .into_iter()
            .filter_map(WirePart::into_part)
            .collect();
        assert_eq!(
            parts[0],
            Part::FunctionCall {
                name: "semantic_search_document".into(),
                args: json!({"query": "fees"})
            }
        );
        assert_eq!(parts[1], Part::Text("done".into()));
    }

    #[test]
    fn empty_candidates_yield_no_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.into_first_parts().is_empty());

        let blocked: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert!(blocked.into_first_parts().is_empty());
    }
}
