pub mod database;
pub mod vector;

pub use database::{Database, DatabaseError, DocumentRecord, NewChunk, NewDocument, ScoredChunk};
