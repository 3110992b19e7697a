//! Error types for the RAG agent

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG agent errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parse or serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Neither context source format is present on disk
    #[error(
        "No context file found. Please add either:\n  - {}\n  - {}\n\nTIP: Markdown (.md) is recommended for better structure and accuracy!",
        markdown.display(),
        pdf.display()
    )]
    ContextNotFound { markdown: PathBuf, pdf: PathBuf },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unrecognized embedding or language model provider
    #[error("Unsupported {kind} provider: {provider}")]
    UnsupportedProvider { kind: &'static str, provider: String },

    /// Search or retrieval before the vector store was loaded or built
    #[error("Vector store not initialized. Call load() or save() first.")]
    UninitializedStore,

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Ollama/LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt rendering error
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported provider error
    pub fn unsupported_provider(kind: &'static str, provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            kind,
            provider: provider.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::VectorDb(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_not_found_lists_both_paths() {
        let err = Error::ContextNotFound {
            markdown: PathBuf::from("/data/docs.md"),
            pdf: PathBuf::from("/data/docs.pdf"),
        };
        let message = err.to_string();

        assert!(message.contains("/data/docs.md"));
        assert!(message.contains("/data/docs.pdf"));
    }

    #[test]
    fn test_unsupported_provider_names_provider() {
        let err = Error::unsupported_provider("embedding", "openai");
        assert_eq!(err.to_string(), "Unsupported embedding provider: openai");
    }
}
