pub mod agent;
pub mod analysis;
pub mod embeddings;
pub mod semantic_search;

pub use agent::DocumentAgent;
pub use analysis::DocumentAnalyzer;
pub use embeddings::EmbeddingGenerator;
pub use semantic_search::SemanticSearch;
