//! Answer generation: Ollama client and chat prompt templates

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;
pub use prompt::{stuff_context, ChatMessage, ChatPromptTemplate, PromptTemplate, Role};
