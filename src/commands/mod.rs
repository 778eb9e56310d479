use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::{ApiClient, DocumentApi, SelectedFile, Workspace};

pub mod document;
mod system;

pub use system::print_help;

/// Drives a [`Workspace`] from typed commands and prints what changed.
pub struct CommandHandler<A: DocumentApi = ApiClient> {
    workspace: Workspace<A>,
}

impl<A: DocumentApi> CommandHandler<A> {
    pub fn new(api: A) -> Self {
        Self {
            workspace: Workspace::new(api),
        }
    }

    pub fn workspace(&self) -> &Workspace<A> {
        &self.workspace
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<(), String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        let (command, rest) = input
            .split_once(char::is_whitespace)
            .map(|(c, r)| (c, r.trim()))
            .unwrap_or((input, ""));

        match command.to_lowercase().as_str() {
            "help" => {
                print_help();
                Ok(())
            }
            "list" | "docs" => self.list().await,
            "open" => self.open(rest).await,
            "show" => self.show(),
            "upload" => self.upload(Path::new(rest)).await,
            "ask" => self.ask(rest).await,
            "search" => self.search(rest).await,
            "agent" => self.agent(rest).await,
            _ => Err(format!(
                "Unknown command: {command}. Type 'help' for available commands."
            )),
        }
    }

    /// Turns a workspace outcome into a command result, surfacing any
    /// notification it left behind.
    fn outcome(&self, ok: bool) -> Result<(), String> {
        if let Some(notification) = self.workspace.notification() {
            document::print_notification(notification);
        }
        if ok {
            Ok(())
        } else {
            Err("Command failed.".to_string())
        }
    }

    pub async fn list(&mut self) -> Result<(), String> {
        let ok = self.workspace.refresh_documents().await;
        if ok {
            document::print_documents(self.workspace.documents());
        }
        self.outcome(ok)
    }

    pub async fn open(&mut self, document_id: &str) -> Result<(), String> {
        if document_id.is_empty() {
            return Err("Usage: open <document id>".to_string());
        }
        let ok = self.workspace.open_document(document_id).await;
        if ok {
            self.show()?;
        }
        self.outcome(ok)
    }

    pub fn show(&self) -> Result<(), String> {
        match self.workspace.active() {
            Some(active) => {
                document::print_document(active);
                Ok(())
            }
            None => Err("No document open. Use 'open <id>' or 'upload <file>'.".to_string()),
        }
    }

    pub async fn upload(&mut self, path: &Path) -> Result<(), String> {
        if path.as_os_str().is_empty() {
            return Err("Usage: upload <file.pdf>".to_string());
        }
        let file = SelectedFile::read(path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        if !self.workspace.select_file(file) {
            return self.outcome(false);
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Uploading and processing...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let ok = self.workspace.upload().await;
        spinner.finish_and_clear();

        if ok {
            self.show()?;
        }
        self.outcome(ok)
    }

    pub async fn ask(&mut self, question: &str) -> Result<(), String> {
        self.workspace.set_question(question);
        let ok = self.workspace.ask().await;
        if let Some(answer) = self.workspace.answer().filter(|_| ok) {
            document::print_answer(answer);
        }
        self.outcome(ok)
    }

    pub async fn search(&mut self, query: &str) -> Result<(), String> {
        self.workspace.set_search_query(query);
        let ok = self.workspace.search().await;
        if ok {
            if self.workspace.search_results().is_empty() {
                println!("{}", "No results.".dimmed());
            } else {
                document::print_results(self.workspace.search_results());
            }
        }
        self.outcome(ok)
    }

    pub async fn agent(&mut self, query: &str) -> Result<(), String> {
        let ok = self.workspace.agent_query(query).await;
        if let Some(response) = self.workspace.agent_response().filter(|_| ok) {
            document::print_agent_response(response);
        }
        self.outcome(ok)
    }
}
