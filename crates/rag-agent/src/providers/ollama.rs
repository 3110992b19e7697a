//! Ollama-based providers for embeddings and LLM
//!
//! Wraps the shared OllamaClient to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingsConfig, ModelConfig};
use crate::error::Result;
use crate::generation::{ChatMessage, OllamaClient};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

const EMBED_TIMEOUT_SECS: u64 = 60;
const EMBED_MAX_RETRIES: u32 = 2;

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, EMBED_TIMEOUT_SECS, EMBED_MAX_RETRIES)?;
        Ok(Self::from_client(Arc::new(client), config.model.clone()))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, config.timeout_secs, config.max_retries)?;
        Ok(Self::from_client(Arc::new(client), config.name.clone(), config.temperature))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    /// Sampling temperature sent with every request
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.chat(&self.model, messages, self.temperature).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
