//! Provider abstractions for embeddings and language models
//!
//! Backends are selected by name from configuration.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod onnx;

pub use embedding::{EmbeddingBackend, EmbeddingFactory, EmbeddingProvider};
pub use llm::{LlmBackend, LlmFactory, LlmProvider};
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use onnx::OnnxEmbedder;
