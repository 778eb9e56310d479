use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::types::{
    Content, EmbedContentRequest, EmbedContentResponse, FunctionDeclaration, GenerateContentRequest,
    GenerateContentResponse, Tool,
};
use crate::config::ProviderConfig;
use crate::providers::traits::{
    ChatMessage, CompletionProvider, EmbeddingTask, GenerationConfig, Role, ToolDeclaration,
};

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    client: Client,
    api_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: ProviderConfig, client: Client) -> Self {
        Self {
            api_key: config.api_key,
            client,
            api_url: config.api_url,
            model: config.model,
            embedding_model: config.embedding_model,
            temperature: config.temperature,
        }
    }

    fn endpoint(&self, model: &str, action: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:{}", self.api_url, model, action)
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini request failed: Status {}, Body: {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let url = self.endpoint(&self.model, "generateContent");
        debug!(model = %self.model, turns = request.contents.len(), "gemini generateContent");
        self.post(&url, request).await
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut generation_config = config.clone();
        generation_config.temperature = generation_config.temperature.or(Some(self.temperature));

        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: None,
            tools: None,
            generation_config: Some((&generation_config).into()),
        };

        let response = self.generate(&request).await?;
        response
            .into_first_parts()
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| anyhow!("Invalid response format: no text in first candidate"))
    }

    async fn generate_embedding(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        let model = self
            .embedding_model
            .strip_prefix("models/")
            .unwrap_or(&self.embedding_model);
        let request = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content::text(None, text),
            task_type: task.as_str().to_string(),
        };

        let url = self.endpoint(model, "embedContent");
        let response: EmbedContentResponse = self.post(&url, &request).await?;
        if response.embedding.values.is_empty() {
            return Err(anyhow!("Gemini returned an empty embedding"));
        }
        Ok(response.embedding.values)
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[ToolDeclaration],
        system_instruction: Option<&str>,
    ) -> Result<ChatMessage> {
        let tools = if tools.is_empty() {
            None
        } else {
            Some(vec![Tool {
                function_declarations: tools.iter().map(FunctionDeclaration::from).collect(),
            }])
        };

        let request = GenerateContentRequest {
            contents: history.iter().map(Content::from).collect(),
            system_instruction: system_instruction.map(|s| Content::text(None, s)),
            tools,
            generation_config: Some(
                (&GenerationConfig {
                    temperature: Some(self.temperature),
                    ..Default::default()
                })
                    .into(),
            ),
        };

        let parts = self
            .generate(&request)
            .await?
            .into_first_parts()
            .into_iter()
            .filter_map(|part| part.into_part())
            .collect();

        Ok(ChatMessage {
            role: Role::Model,
            parts,
        })
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.model.clone())
    }
}
