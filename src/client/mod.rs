//! Client side of the document service: the HTTP calls and the view state
//! the terminal front end drives.

use async_trait::async_trait;

mod api_client;
mod workspace;

pub use api_client::{ApiClient, ClientError};
pub use workspace::{Action, ActiveDocument, Notification, SelectedFile, Workspace};

use crate::models::{
    AgentQueryResponse, AnswerResponse, DocumentDetails, DocumentListItem, SearchResponse,
    UploadPdfResponse,
};

#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentListItem>, ClientError>;

    async fn get_document(&self, document_id: &str) -> Result<DocumentDetails, ClientError>;

    async fn upload_pdf(&self, filename: &str, bytes: Vec<u8>)
        -> Result<UploadPdfResponse, ClientError>;

    async fn ask_question(
        &self,
        document_id: &str,
        question: &str,
    ) -> Result<AnswerResponse, ClientError>;

    async fn semantic_search(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<SearchResponse, ClientError>;

    async fn agent_query(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<AgentQueryResponse, ClientError>;
}
