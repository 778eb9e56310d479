use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::ProcessingError;
use crate::models::Entity;

/// Turns raw file bytes into text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessingError>;
}

/// PDF text extraction backed by `pdf-extract`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessingError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ProcessingError::Pdf(e.to_string()))
    }
}

/// Window sizes for chunking, counted in whitespace-separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl ChunkConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self, ProcessingError> {
        if max_tokens == 0 {
            return Err(ProcessingError::ChunkConfig("max_tokens must be positive".into()));
        }
        if overlap_tokens >= max_tokens {
            return Err(ProcessingError::ChunkConfig(format!(
                "overlap ({overlap_tokens}) must be smaller than max ({max_tokens})"
            )));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 50,
        }
    }
}

/// An entity as reported by the language model, before it is located in
/// the text. Either field may be missing in model output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityCandidate {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text into overlapping word windows.
///
/// Each window holds at most `max_tokens` words; the next window starts
/// `overlap_tokens` words before the previous one ended. The final window
/// always contains words not covered by an earlier one.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + config.max_tokens).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start = end - config.overlap_tokens;
    }
    chunks
}

/// Finds the first occurrence of each candidate in `text`.
///
/// Candidates without both text and label are dropped. Offsets are in
/// characters so they index the same string on every client.
pub fn locate_entities(text: &str, candidates: Vec<EntityCandidate>) -> Vec<Entity> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let surface = candidate.text.filter(|t| !t.is_empty())?;
            let label = candidate.label.filter(|l| !l.is_empty())?;

            let (start, end) = match text.find(surface.as_str()) {
                Some(byte_idx) => {
                    let start = text[..byte_idx].chars().count();
                    (Some(start), Some(start + surface.chars().count()))
                }
                None => (None, None),
            };

            Some(Entity {
                text: surface,
                label,
                start,
                end,
            })
        })
        .collect()
}

pub fn is_pdf_filename(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

#[derive(Clone)]
pub struct DocumentProcessor {
    extractor: Arc<dyn TextExtractor>,
    chunking: ChunkConfig,
}

impl DocumentProcessor {
    pub fn new(extractor: Arc<dyn TextExtractor>, chunking: ChunkConfig) -> Self {
        Self {
            extractor,
            chunking,
        }
    }

    pub fn pdf(chunking: ChunkConfig) -> Self {
        Self::new(Arc::new(PdfExtractor), chunking)
    }

    /// Extracts and cleans text on the blocking pool; PDF parsing is CPU
    /// bound and the parser may panic on malformed input.
    pub async fn extract_clean_text(&self, bytes: Vec<u8>) -> Result<String, ProcessingError> {
        let extractor = Arc::clone(&self.extractor);
        let raw = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| ProcessingError::Pdf(format!("extraction task failed: {e}")))??;

        let cleaned = clean_text(&raw);
        debug!(raw_len = raw.len(), cleaned_len = cleaned.len(), "extracted document text");
        if cleaned.is_empty() {
            return Err(ProcessingError::EmptyText);
        }
        Ok(cleaned)
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, &self.chunking)
    }
}
