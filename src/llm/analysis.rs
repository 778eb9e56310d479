use std::sync::Arc;

use anyhow::Result;
use tracing::{error, warn};

use crate::document::EntityCandidate;
use crate::providers::traits::{CompletionProvider, GenerationConfig};
use crate::providers::utils::strip_code_fence;

pub const SUMMARY_FALLBACK: &str = "Failed to generate summary.";
pub const ANSWER_FALLBACK: &str = "I apologize, but I couldn't generate an answer at this time.";

/// Prompts the language model for summaries, entities and grounded answers.
/// Every operation except [`DocumentAnalyzer::check`] degrades to a fixed
/// fallback instead of failing the request.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    provider: Arc<dyn CompletionProvider>,
}

impl DocumentAnalyzer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate_summary(&self, text: &str) -> String {
        let prompt = format!(
            "Summarize the following document concisely, highlighting key points. \
             Keep the summary to a maximum of 200 words:\n\n{text}"
        );

        match self
            .provider
            .complete(&prompt, &GenerationConfig::max_tokens(250))
            .await
        {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                error!("Error generating summary: {e}");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    pub async fn extract_entities(&self, text: &str) -> Vec<EntityCandidate> {
        let prompt = format!(
            "Extract key entities from the following text. For each entity, identify its type \
             (PERSON, ORG, LOC, DATE, MONEY, GPE) and its exact text. Return the entities as a \
             JSON list of objects with 'text' and 'label' keys. If no entities are found, return \
             an empty list.\n\n\
             Example Format:\n\
             [\n\
             \x20   {{\"text\": \"John Doe\", \"label\": \"PERSON\"}},\n\
             \x20   {{\"text\": \"Google\", \"label\": \"ORG\"}},\n\
             \x20   {{\"text\": \"New York\", \"label\": \"LOC\"}}\n\
             ]\n\n\
             Text:\n\n{text}"
        );

        let response = match self.provider.complete(&prompt, &GenerationConfig::json()).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error extracting entities: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<EntityCandidate>>(strip_code_fence(&response)) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Entity response was not a JSON list: {e}");
                Vec::new()
            }
        }
    }

    pub async fn generate_answer(&self, question: &str, context: &str) -> String {
        let prompt = format!(
            "Based on the following context, answer the question. If the answer is not \
             explicitly present in the context, state that you don't know or that the \
             information is not available. Do not make up information.\n\n\
             Context:\n{context}\n\n\
             Question: {question}\n\n\
             Answer:"
        );

        match self.provider.complete(&prompt, &GenerationConfig::default()).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                error!("Error generating answer: {e}");
                ANSWER_FALLBACK.to_string()
            }
        }
    }

    /// One tiny round trip to confirm the API key and model work.
    pub async fn check(&self) -> Result<String> {
        let response = self
            .provider
            .complete("Say 'hello' in one word.", &GenerationConfig::max_tokens(5))
            .await?;
        Ok(response.trim().to_string())
    }
}
