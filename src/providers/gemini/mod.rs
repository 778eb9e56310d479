#[allow(clippy::module_inception)]
pub mod gemini;
pub mod types;

pub use gemini::GeminiProvider;
