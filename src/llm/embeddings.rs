use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::providers::traits::{CompletionProvider, EmbeddingTask};

/// Embeds document chunks and queries through the configured provider.
/// Query embeddings are cached since users tend to repeat questions.
pub struct EmbeddingGenerator {
    provider: Arc<dyn CompletionProvider>,
    query_cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
    concurrency: usize,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, cache_size: usize, concurrency: usize) -> Self {
        Self {
            provider,
            query_cache: NonZeroUsize::new(cache_size).map(|n| Mutex::new(LruCache::new(n))),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn generate_embedding(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        self.provider.generate_embedding(text, task).await
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.query_cache {
            if let Some(hit) = cache.lock().get(query) {
                debug!("query embedding cache hit");
                return Ok(hit.clone());
            }
        }

        let embedding = self
            .generate_embedding(query, EmbeddingTask::RetrievalQuery)
            .await?;

        if let Some(cache) = &self.query_cache {
            cache.lock().put(query.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    /// Embeds every text, keeping input order. Fails on the first error.
    ///
    /// Request futures must own their provider handle and text; borrowing
    /// `self` in the stream makes the calling axum handler non-`Send`.
    pub async fn generate_batch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = Arc::clone(&self.provider);
        stream::iter(texts.to_vec())
            .map(move |text| {
                let provider = Arc::clone(&provider);
                async move {
                    provider
                        .generate_embedding(&text, EmbeddingTask::RetrievalDocument)
                        .await
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
