//! Agent configuration loaded from YAML
//!
//! Every section and every key is optional. Missing keys fall back to the
//! defaults below field by field, so an empty file yields a fully defaulted
//! configuration. Values are not range-checked; [`AgentConfig::warnings`]
//! reports suspicious ones and the loader logs them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default Ollama endpoint shared by the LLM and the Ollama embedder
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent display name
    pub name: String,
    /// Agent description printed in the report banner
    pub description: String,
    /// Prompt templates
    pub prompts: PromptsConfig,
    /// Language model selection
    pub model: ModelConfig,
    /// Embedding model selection
    pub embeddings: EmbeddingsConfig,
    /// Retrieval and chunking settings
    pub rag: RagSettings,
    /// Literal inputs run by `run_test_cases`
    pub test_cases: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "RAG Agent".to_string(),
            description: String::new(),
            prompts: PromptsConfig::default(),
            model: ModelConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            rag: RagSettings::default(),
            test_cases: Vec::new(),
        }
    }
}

/// Two-part chat prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// System instructions, must contain `{context}`
    pub system: String,
    /// Human message, must contain `{input}`
    pub human: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant.\n\nContext: {context}".to_string(),
            human: "{input}".to_string(),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider name (only `ollama` is built in)
    pub provider: String,
    /// Model name as known to the provider
    pub name: String,
    /// Sampling temperature, conventionally in [0, 1]
    pub temperature: f32,
    /// Provider base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            name: "qwen2.5:1.5b".to_string(),
            temperature: 0.1,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Provider name (`huggingface` or `ollama`)
    pub provider: String,
    /// Model name (sentence-transformers id for `huggingface`)
    pub model: String,
    /// Base URL for the `ollama` provider
    pub base_url: String,
    /// Cache directory for downloaded ONNX models
    pub cache_dir: PathBuf,
    /// Maximum token sequence length for the local runtime
    pub max_length: usize,
    /// Batch size for the local runtime
    pub batch_size: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rag-agent")
                .join("models"),
            max_length: 256,
            batch_size: 32,
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Context source base path, without extension
    pub context_file: String,
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between neighbouring chunks in characters
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query
    pub retriever_k: usize,
    /// Split markdown sources at headers before size-bounded splitting
    pub use_md_headers: bool,
    /// Vector store persistence directory
    pub persist_dir: PathBuf,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            context_file: "context".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            retriever_k: 3,
            use_md_headers: true,
            persist_dir: PathBuf::from("./chroma_db"),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        tracing::info!("Loading agent configuration from: {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;

        for warning in config.warnings() {
            tracing::warn!("{}", warning);
        }

        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        // serde_yaml rejects an empty document, but an empty file is a valid config
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        if value.is_null() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_value(value)?)
    }

    /// Serialize to YAML text
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml_string()?)?;
        tracing::info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Values that are accepted but probably not what the user meant
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.model.temperature) {
            warnings.push(format!(
                "model.temperature {} is outside [0, 1]; passing it to the provider unchanged",
                self.model.temperature
            ));
        }
        if self.rag.chunk_size == 0 {
            warnings.push("rag.chunk_size is 0".to_string());
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            warnings.push(format!(
                "rag.chunk_overlap ({}) is not smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            ));
        }
        if self.rag.retriever_k == 0 {
            warnings.push("rag.retriever_k is 0; no context will be retrieved".to_string());
        }
        if !self.prompts.system.contains("{context}") {
            warnings.push("prompts.system has no {context} placeholder".to_string());
        }
        if !self.prompts.human.contains("{input}") {
            warnings.push("prompts.human has no {input} placeholder".to_string());
        }

        warnings
    }
}
