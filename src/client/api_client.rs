use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::DocumentApi;
use crate::config::ClientConfig;
use crate::models::{
    AgentQueryResponse, AnswerResponse, DocumentDetails, DocumentListItem, SearchResponse,
    UploadPdfResponse,
};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid API URL: {0}")]
    Url(String),
}

/// HTTP client for the document service.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: ClientConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &Value,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| match value.get("detail") {
                Some(Value::String(detail)) => Some(detail.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));

        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DocumentApi for ApiClient {
    async fn list_documents(&self) -> Result<Vec<DocumentListItem>, ClientError> {
        self.get_json(&["documents"]).await
    }

    async fn get_document(&self, document_id: &str) -> Result<DocumentDetails, ClientError> {
        self.get_json(&["documents", document_id]).await
    }

    async fn upload_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadPdfResponse, ClientError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload-pdf"])?;
        debug!(%url, %filename, "uploading");
        let response = self.client.post(url).multipart(form).send().await?;
        Self::decode(response).await
    }

    async fn ask_question(
        &self,
        document_id: &str,
        question: &str,
    ) -> Result<AnswerResponse, ClientError> {
        self.post_json(
            &["ask-question"],
            &json!({"document_id": document_id, "question": question}),
        )
        .await
    }

    async fn semantic_search(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<SearchResponse, ClientError> {
        self.post_json(
            &["semantic-search"],
            &json!({"document_id": document_id, "query": query}),
        )
        .await
    }

    async fn agent_query(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<AgentQueryResponse, ClientError> {
        self.post_json(
            &["agent-query"],
            &json!({"document_id": document_id, "query": query}),
        )
        .await
    }
}
