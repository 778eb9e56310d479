pub mod gemini;
pub mod traits;
pub mod utils;

pub use gemini::GeminiProvider;
pub use traits::{
    ChatMessage, CompletionProvider, EmbeddingTask, GenerationConfig, Part, Role, ToolDeclaration,
};
