//! Embedding provider trait and provider selection

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::EmbeddingsConfig;
use crate::error::{Error, Result};

use super::ollama::OllamaEmbedder;
use super::onnx::OnnxEmbedder;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OnnxEmbedder`: sentence-transformers ONNX export run locally (huggingface)
/// - `OllamaEmbedder`: local Ollama server
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Model identifier, recorded in the index manifest
    fn model_name(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Built-in embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    HuggingFace,
    Ollama,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" => Ok(Self::HuggingFace),
            "ollama" => Ok(Self::Ollama),
            _ => Err(Error::unsupported_provider("embedding", s)),
        }
    }
}

/// Selects and constructs the embedding provider
pub struct EmbeddingFactory;

impl EmbeddingFactory {
    /// Create a provider by name with default settings for everything else
    pub async fn create(model_name: &str, provider: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        let config = EmbeddingsConfig {
            provider: provider.to_string(),
            model: model_name.to_string(),
            ..EmbeddingsConfig::default()
        };
        Self::from_config(&config).await
    }

    /// Create the provider described by the `embeddings` config section
    pub async fn from_config(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let backend: EmbeddingBackend = config.provider.parse()?;
        tracing::info!(
            "Initializing {} embeddings with model: {}",
            config.provider,
            config.model
        );

        match backend {
            EmbeddingBackend::HuggingFace => Ok(Arc::new(OnnxEmbedder::new(config).await?)),
            EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("huggingface".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::HuggingFace);
        assert_eq!("Ollama".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Ollama);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let err = EmbeddingFactory::create("text-embedding-3-small", "openai")
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::UnsupportedProvider { kind: "embedding", ref provider } if provider == "openai"
        ));
        assert_eq!(err.to_string(), "Unsupported embedding provider: openai");
    }

    #[tokio::test]
    async fn test_ollama_embedder_construction() {
        let provider = EmbeddingFactory::create("nomic-embed-text", "ollama").await.unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }
}
