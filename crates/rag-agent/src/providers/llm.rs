//! LLM provider trait and provider selection

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::generation::ChatMessage;

use super::ollama::OllamaLlm;

/// Trait for chat-style text generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (qwen2.5, llama3, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a reply to the rendered prompt messages
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the model being used
    fn model_name(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Built-in language model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
}

impl FromStr for LlmBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            _ => Err(Error::unsupported_provider("model", s)),
        }
    }
}

/// Selects and constructs the language model provider
pub struct LlmFactory;

impl LlmFactory {
    /// Create a provider by name with default connection settings
    pub fn create(model_name: &str, temperature: f32, provider: &str) -> Result<Arc<dyn LlmProvider>> {
        let config = ModelConfig {
            provider: provider.to_string(),
            name: model_name.to_string(),
            temperature,
            ..ModelConfig::default()
        };
        Self::from_config(&config)
    }

    /// Create the provider described by the `model` config section
    pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        let backend: LlmBackend = config.provider.parse()?;
        tracing::info!("Initializing LLM: {} via {}", config.name, config.provider);

        match backend {
            LlmBackend::Ollama => Ok(Arc::new(OllamaLlm::new(config)?)),
        }
    }
}
