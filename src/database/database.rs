use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use super::vector::{decode_embedding, encode_embedding, rank_top_k};
use crate::models::{DocumentListItem, Entity};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt embedding for document {document_id} chunk {chunk_index}")]
    CorruptEmbedding {
        document_id: String,
        chunk_index: usize,
    },
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub summary: String,
    pub entities: Vec<Entity>,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub summary: Option<String>,
    pub entities: Vec<Entity>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: usize,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub chunk_text: String,
    pub score: f32,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        }

        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::from_connection(conn).await
    }

    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Arc::new(conn),
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                    CREATE TABLE IF NOT EXISTS documents (
                        id TEXT PRIMARY KEY,
                        user_id TEXT NOT NULL,
                        filename TEXT NOT NULL,
                        storage_path TEXT NOT NULL,
                        summary TEXT,
                        entities TEXT NOT NULL DEFAULT '[]',
                        content TEXT,
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id);
                    CREATE TABLE IF NOT EXISTS document_chunks (
                        id INTEGER PRIMARY KEY,
                        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                        chunk_index INTEGER NOT NULL,
                        chunk_text TEXT NOT NULL,
                        embedding BLOB NOT NULL,
                        UNIQUE(document_id, chunk_index)
                    );
                    CREATE TABLE IF NOT EXISTS conversations (
                        id INTEGER PRIMARY KEY,
                        user_id TEXT NOT NULL,
                        document_id TEXT NOT NULL,
                        user_message TEXT NOT NULL,
                        ai_response TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );",
                )?;
                Ok(())
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    /// Inserts document metadata and returns the new document id.
    pub async fn insert_document(&self, document: NewDocument) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let entities = serde_json::to_string(&document.entities)?;
        let created_at = Utc::now().to_rfc3339();

        let row_id = id.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents
                        (id, user_id, filename, storage_path, summary, entities, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row_id,
                        document.user_id,
                        document.filename,
                        document.storage_path,
                        document.summary,
                        entities,
                        document.content,
                        created_at,
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(document_id = %id, "inserted document metadata");
        Ok(id)
    }

    pub async fn get_user_documents(
        &self,
        user_id: &str,
    ) -> Result<Vec<DocumentListItem>, DatabaseError> {
        let user_id = user_id.to_string();
        let documents = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename FROM documents
                     WHERE user_id = ?1
                     ORDER BY created_at, rowid",
                )?;
                let rows = stmt.query_map([&user_id], |row| {
                    Ok(DocumentListItem {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                    })
                })?;

                let mut documents = Vec::new();
                for row in rows {
                    documents.push(row?);
                }
                Ok(documents)
            })
            .await?;

        Ok(documents)
    }

    pub async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, DatabaseError> {
        let document_id = document_id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, user_id, filename, storage_path, summary, entities, content, created_at
                         FROM documents WHERE id = ?1",
                        [&document_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Option<String>>(4)?,
                                row.get::<_, String>(5)?,
                                row.get::<_, Option<String>>(6)?,
                                row.get::<_, String>(7)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((id, user_id, filename, storage_path, summary, entities, content, created_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(DocumentRecord {
            id,
            user_id,
            filename,
            storage_path,
            summary,
            entities: serde_json::from_str(&entities)?,
            content,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }))
    }

    pub async fn get_summary(&self, document_id: &str) -> Result<Option<String>, DatabaseError> {
        let document_id = document_id.to_string();
        let summary = self
            .conn
            .call(move |conn| {
                let summary = conn
                    .query_row(
                        "SELECT summary FROM documents WHERE id = ?1",
                        [&document_id],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?;
                Ok(summary.flatten())
            })
            .await?;

        Ok(summary.filter(|s| !s.is_empty()))
    }

    pub async fn get_entities(
        &self,
        document_id: &str,
    ) -> Result<Option<Vec<Entity>>, DatabaseError> {
        let document_id = document_id.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                let raw = conn
                    .query_row(
                        "SELECT entities FROM documents WHERE id = ?1",
                        [&document_id],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(raw)
            })
            .await?;

        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(DatabaseError::from)
    }

    pub async fn insert_document_chunks(
        &self,
        document_id: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<(), DatabaseError> {
        let document_id = document_id.to_string();
        let count = chunks.len();
        let rows: Vec<(i64, String, Vec<u8>)> = chunks
            .into_iter()
            .map(|c| (c.chunk_index as i64, c.chunk_text, encode_embedding(&c.embedding)))
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO document_chunks (document_id, chunk_index, chunk_text, embedding)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (index, text, embedding) in &rows {
                        stmt.execute(params![document_id, index, text, embedding])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        debug!(chunks = count, "inserted document chunks");
        Ok(())
    }

    /// Chunk texts in document order, at most `limit` of them.
    pub async fn get_document_chunks(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, DatabaseError> {
        let document_id = document_id.to_string();
        let limit = limit as i64;
        let chunks = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT chunk_text FROM document_chunks
                     WHERE document_id = ?1
                     ORDER BY chunk_index
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![document_id, limit], |row| row.get::<_, String>(0))?;

                let mut chunks = Vec::new();
                for row in rows {
                    chunks.push(row?);
                }
                Ok(chunks)
            })
            .await?;

        Ok(chunks)
    }

    /// The `top_k` chunks of one document most similar to `query_embedding`.
    pub async fn search_chunks(
        &self,
        document_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, DatabaseError> {
        let owned_id = document_id.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT chunk_index, chunk_text, embedding FROM document_chunks
                     WHERE document_id = ?1
                     ORDER BY chunk_index",
                )?;
                let rows = stmt.query_map([&owned_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?;

                let mut chunks = Vec::new();
                for row in rows {
                    chunks.push(row?);
                }
                Ok(chunks)
            })
            .await?;

        let mut decoded = Vec::with_capacity(rows.len());
        for (index, text, blob) in rows {
            let chunk_index = index as usize;
            let embedding = decode_embedding(&blob).ok_or_else(|| DatabaseError::CorruptEmbedding {
                document_id: document_id.to_string(),
                chunk_index,
            })?;
            decoded.push(((chunk_index, text), embedding));
        }

        let ranked = rank_top_k(
            query_embedding,
            decoded.iter().map(|(chunk, embedding)| (chunk, embedding.as_slice())),
            top_k,
        );

        Ok(ranked
            .into_iter()
            .map(|((chunk_index, chunk_text), score)| ScoredChunk {
                chunk_index: *chunk_index,
                chunk_text: chunk_text.clone(),
                score,
            })
            .collect())
    }

    pub async fn save_conversation(
        &self,
        user_id: &str,
        document_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<(), DatabaseError> {
        let values = [
            user_id.to_string(),
            document_id.to_string(),
            user_message.to_string(),
            ai_response.to_string(),
            Utc::now().to_rfc3339(),
        ];
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (user_id, document_id, user_message, ai_response, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![values[0], values[1], values[2], values[3], values[4]],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    #[cfg(test)]
    pub async fn conversation_count(&self, document_id: &str) -> Result<usize, DatabaseError> {
        let document_id = document_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM conversations WHERE document_id = ?1",
                    [&document_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }
}
