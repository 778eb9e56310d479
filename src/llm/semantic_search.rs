use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use super::embeddings::EmbeddingGenerator;
use crate::database::{Database, NewChunk};

/// Chunk retrieval scoped to a single document.
#[derive(Clone)]
pub struct SemanticSearch {
    database: Database,
    embeddings: Arc<EmbeddingGenerator>,
}

impl SemanticSearch {
    pub fn new(database: Database, embeddings: Arc<EmbeddingGenerator>) -> Self {
        Self {
            database,
            embeddings,
        }
    }

    /// Embeds and stores every chunk of a document. Returns how many were
    /// stored.
    pub async fn index_document(&self, document_id: &str, chunks: Vec<String>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embeddings.generate_batch_embeddings(&chunks).await?;
        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (chunk_text, embedding))| NewChunk {
                chunk_index,
                chunk_text,
                embedding,
            })
            .collect();

        let count = rows.len();
        self.database.insert_document_chunks(document_id, rows).await?;
        debug!(document_id, chunks = count, "indexed document");
        Ok(count)
    }

    /// Texts of the `top_k` chunks closest to `query`, best first.
    ///
    /// A failing embedding call is an error; a failing lookup is logged and
    /// reads as "nothing relevant".
    pub async fn relevant_chunks(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let query_embedding = self.embeddings.embed_query(query).await?;

        match self
            .database
            .search_chunks(document_id, &query_embedding, top_k)
            .await
        {
            Ok(hits) => Ok(hits.into_iter().map(|hit| hit.chunk_text).collect()),
            Err(e) => {
                error!("Error fetching relevant chunks: {e}");
                Ok(Vec::new())
            }
        }
    }
}
