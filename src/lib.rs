pub mod api;
pub mod client;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod providers;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use api::{create_api, AppState};
pub use client::{ApiClient, DocumentApi, Workspace};
pub use database::Database;
pub use document::DocumentProcessor;
