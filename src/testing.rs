//! In-process provider used by unit tests in place of the Gemini API.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::TextExtractor;
use crate::error::ProcessingError;
use crate::providers::traits::{
    ChatMessage, CompletionProvider, EmbeddingTask, GenerationConfig, ToolDeclaration,
};

const DIMENSIONS: usize = 64;

/// Answers prompts by their leading instruction, embeds text as a hashed
/// bag of words and replays queued chat turns.
pub struct ScriptedProvider {
    pub summary: String,
    pub entities: String,
    pub answer: String,
    fail_completions: bool,
    fail_embeddings: bool,
    turns: Mutex<VecDeque<ChatMessage>>,
    prompts: Mutex<Vec<String>>,
    histories: Mutex<Vec<Vec<ChatMessage>>>,
    embedding_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            summary: "Scripted summary.".to_string(),
            entities: r#"[{"text": "ACME", "label": "ORG"}]"#.to_string(),
            answer: "Scripted answer.".to_string(),
            fail_completions: false,
            fail_embeddings: false,
            turns: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            histories: Mutex::new(Vec::new()),
            embedding_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_completions(mut self) -> Self {
        self.fail_completions = true;
        self
    }

    pub fn fail_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    pub fn with_entities(mut self, json: &str) -> Self {
        self.entities = json.to_string();
        self
    }

    pub fn with_turns(self, turns: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.turns.lock().extend(turns);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn histories(&self) -> Vec<Vec<ChatMessage>> {
        self.histories.lock().clone()
    }

    pub fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }
}

/// Hashed bag-of-words vector; texts sharing words point the same way.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() as usize) % DIMENSIONS] += 1.0;
    }
    vector
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail_completions {
            return Err(anyhow!("scripted completion failure"));
        }

        let response = if prompt.starts_with("Summarize the following document") {
            self.summary.as_str()
        } else if prompt.starts_with("Extract key entities") {
            self.entities.as_str()
        } else if prompt.starts_with("Based on the following context") {
            self.answer.as_str()
        } else {
            "Hello"
        };
        Ok(response.to_string())
    }

    async fn generate_embedding(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings {
            return Err(anyhow!("scripted embedding failure"));
        }
        Ok(bag_of_words(text))
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        _tools: &[ToolDeclaration],
        _system_instruction: Option<&str>,
    ) -> Result<ChatMessage> {
        self.histories.lock().push(history.to_vec());
        self.turns
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted chat turn left"))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("scripted".to_string())
    }
}

/// Treats uploads as plain UTF-8 so tests need no real PDF.
pub struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ProcessingError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| ProcessingError::Pdf(e.to_string()))
    }
}
