//! Local file storage for uploaded PDFs.

use std::path::PathBuf;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct PdfStorage {
    root: PathBuf,
}

impl PdfStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes `bytes` under `documents/{user_id}/{uuid}_{filename}` and
    /// returns that path relative to the storage root. Stored files are never
    /// replaced, so each document keeps its own bytes.
    pub async fn upload_pdf(
        &self,
        filename: &str,
        bytes: &[u8],
        user_id: &str,
    ) -> Result<String, StorageError> {
        let user = safe_component(user_id)?;
        let name = safe_component(filename)?;

        let stored_name = format!("{}_{}", Uuid::new_v4(), name);
        let relative = format!("documents/{user}/{stored_name}");
        let dir = self.root.join("documents").join(user);
        tokio::fs::create_dir_all(&dir).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&stored_name))
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(path = %relative, size = bytes.len(), "stored upload");
        Ok(relative)
    }

    #[cfg(test)]
    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        if relative.split('/').any(|c| c == ".." || c.is_empty()) {
            return Err(StorageError::InvalidName(relative.to_string()));
        }
        Ok(tokio::fs::read(self.root.join(relative)).await?)
    }
}

/// Keeps only the final path component so uploads cannot escape their
/// directory.
fn safe_component(raw: &str) -> Result<&str, StorageError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidName(raw.to_string()));
    }
    Ok(name)
}
