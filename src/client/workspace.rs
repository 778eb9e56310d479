use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use super::DocumentApi;
use crate::document::is_pdf_filename;
use crate::models::{AgentQueryResponse, DocumentListItem, Entity};

/// A local file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }
}

/// The document currently shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveDocument {
    pub id: String,
    pub filename: String,
    pub extracted_text: String,
    pub summary: String,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Documents,
    Open,
    Upload,
    Ask,
    Search,
    Agent,
}

/// Client-side view state over a [`DocumentApi`].
///
/// Each action issues at most one request. Failures never propagate: they
/// become an error notification and leave the rest of the state alone.
pub struct Workspace<A: DocumentApi> {
    api: A,
    documents: Vec<DocumentListItem>,
    selected_file: Option<SelectedFile>,
    active: Option<ActiveDocument>,
    question: String,
    answer: Option<String>,
    search_query: String,
    search_results: Vec<String>,
    agent_response: Option<AgentQueryResponse>,
    notification: Option<Notification>,
    in_flight: HashSet<Action>,
}

impl<A: DocumentApi> Workspace<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            documents: Vec::new(),
            selected_file: None,
            active: None,
            question: String::new(),
            answer: None,
            search_query: String::new(),
            search_results: Vec::new(),
            agent_response: None,
            notification: None,
            in_flight: HashSet::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn documents(&self) -> &[DocumentListItem] {
        &self.documents
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_ref()
    }

    pub fn active(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_results(&self) -> &[String] {
        &self.search_results
    }

    pub fn agent_response(&self) -> Option<&AgentQueryResponse> {
        self.agent_response.as_ref()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_in_flight(&self, action: Action) -> bool {
        self.in_flight.contains(&action)
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = question.into();
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    fn fail(&mut self, message: impl Into<String>) -> bool {
        self.notification = Some(Notification::Error(message.into()));
        false
    }

    fn begin(&mut self, action: Action) -> bool {
        self.in_flight.insert(action)
    }

    fn finish(&mut self, action: Action) {
        self.in_flight.remove(&action);
    }

    fn reset_conversation(&mut self) {
        self.question.clear();
        self.answer = None;
        self.search_query.clear();
        self.search_results.clear();
        self.agent_response = None;
    }

    fn active_id(&self) -> Option<String> {
        self.active.as_ref().map(|doc| doc.id.clone())
    }

    /// Picks a file for upload. Only PDFs are accepted.
    pub fn select_file(&mut self, file: SelectedFile) -> bool {
        if !is_pdf_filename(&file.name) {
            self.selected_file = None;
            return self.fail("Please select a PDF file.");
        }
        self.selected_file = Some(file);
        self.notification = None;
        true
    }

    pub async fn upload(&mut self) -> bool {
        let Some(file) = self.selected_file.clone() else {
            return self.fail("Please select a PDF file to upload.");
        };
        if !self.begin(Action::Upload) {
            return false;
        }
        self.notification = None;

        let result = self.api.upload_pdf(&file.name, file.bytes).await;
        self.finish(Action::Upload);

        match result {
            Ok(response) => {
                debug!(document_id = %response.document_id, "upload finished");
                if !self.documents.iter().any(|d| d.id == response.document_id) {
                    self.documents.push(DocumentListItem {
                        id: response.document_id.clone(),
                        filename: file.name.clone(),
                    });
                }
                self.active = Some(ActiveDocument {
                    id: response.document_id,
                    filename: file.name,
                    extracted_text: response.extracted_text,
                    summary: response.summary,
                    entities: response.entities,
                });
                self.reset_conversation();
                self.notification = Some(Notification::Success(
                    "PDF uploaded and processed successfully.".to_string(),
                ));
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn refresh_documents(&mut self) -> bool {
        if !self.begin(Action::Documents) {
            return false;
        }
        let result = self.api.list_documents().await;
        self.finish(Action::Documents);

        match result {
            Ok(documents) => {
                self.documents = documents;
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Switches to another document. Question, answer and search state are
    /// reset even if loading the document fails.
    pub async fn open_document(&mut self, document_id: &str) -> bool {
        if !self.begin(Action::Open) {
            return false;
        }
        self.reset_conversation();
        let result = self.api.get_document(document_id).await;
        self.finish(Action::Open);

        match result {
            Ok(details) => {
                let filename = if details.filename.is_empty() {
                    self.documents
                        .iter()
                        .find(|d| d.id == document_id)
                        .map(|d| d.filename.clone())
                        .unwrap_or_default()
                } else {
                    details.filename
                };
                self.active = Some(ActiveDocument {
                    id: document_id.to_string(),
                    filename,
                    extracted_text: details.extracted_text,
                    summary: details.summary,
                    entities: details.entities,
                });
                self.notification = None;
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn ask(&mut self) -> bool {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return self.fail("Please enter a question.");
        }
        let Some(document_id) = self.active_id() else {
            return self.fail("Please upload or select a document first.");
        };
        if !self.begin(Action::Ask) {
            return false;
        }

        let result = self.api.ask_question(&document_id, &question).await;
        self.finish(Action::Ask);

        match result {
            Ok(response) => {
                self.answer = Some(response.answer);
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn search(&mut self) -> bool {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return self.fail("Please enter a search query.");
        }
        let Some(document_id) = self.active_id() else {
            return self.fail("Please upload or select a document first.");
        };
        if !self.begin(Action::Search) {
            return false;
        }

        let result = self.api.semantic_search(&document_id, &query).await;
        self.finish(Action::Search);

        match result {
            Ok(response) => {
                self.search_results = response.results;
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn agent_query(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return self.fail("Please enter a query.");
        }
        let Some(document_id) = self.active_id() else {
            return self.fail("Please upload or select a document first.");
        };
        if !self.begin(Action::Agent) {
            return false;
        }

        let result = self.api.agent_query(&document_id, query).await;
        self.finish(Action::Agent);

        match result {
            Ok(response) => {
                self.agent_response = Some(response);
                true
            }
            Err(e) => self.fail(e.to_string()),
        }
    }
}
