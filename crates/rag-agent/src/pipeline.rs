//! End-to-end pipeline
//!
//! Load the vector store if it was persisted before; otherwise load the
//! context source, chunk it, embed and persist it. Then build the language
//! model, wire up the agent and run the configured test cases.

use std::sync::Arc;

use crate::agent::RagAgent;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::ingestion::{context_candidates, ChunkingStrategy, LoaderRegistry};
use crate::providers::{EmbeddingFactory, EmbeddingProvider, LlmFactory, LlmProvider};
use crate::retrieval::{LocalVectorStore, SourceInfo, VectorStoreRepository};
use crate::types::AgentResponse;

/// Wires configuration, ingestion, storage and generation together
pub struct Pipeline {
    config: AgentConfig,
    loaders: LoaderRegistry,
}

impl Pipeline {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            loaders: LoaderRegistry::default(),
        }
    }

    /// Use a custom loader registry (e.g. with extra formats registered)
    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Load the persisted store, or build and persist a new one
    pub async fn prepare_store(&self, embedder: Arc<dyn EmbeddingProvider>) -> Result<LocalVectorStore> {
        let rag = &self.config.rag;

        let existing = LocalVectorStore::with_source(
            rag.persist_dir.clone(),
            Arc::clone(&embedder),
            current_source(&rag.context_file),
        );
        if existing.load().await? {
            return Ok(existing);
        }

        tracing::info!("Creating new vector store...");
        let (path, documents) = self.loaders.detect_and_load(&rag.context_file)?;

        let strategy = ChunkingStrategy::from_config(&path, rag)?;
        tracing::info!("Chunking with {} strategy", strategy.name());
        let chunks = strategy.chunk(&documents);

        let store = LocalVectorStore::with_source(
            rag.persist_dir.clone(),
            embedder,
            Some(SourceInfo::from_path(&path)?),
        );
        store.save(&chunks).await?;
        Ok(store)
    }

    /// Build the agent with the given providers
    pub async fn build_agent_with(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<RagAgent> {
        let store = self.prepare_store(embedder).await?;
        RagAgent::new(&self.config, &store, llm)
    }

    /// Build the agent with the configured providers
    pub async fn build_agent(&self) -> Result<RagAgent> {
        let embedder = EmbeddingFactory::from_config(&self.config.embeddings).await?;
        let store = self.prepare_store(embedder).await?;
        let llm = LlmFactory::from_config(&self.config.model)?;
        RagAgent::new(&self.config, &store, llm)
    }

    /// Build everything and run the configured test cases
    pub async fn run(&self) -> Result<Vec<AgentResponse>> {
        let agent = self.build_agent().await?;
        Ok(agent.run_test_cases().await)
    }
}

/// Fingerprint of the context source that would be used now, if any
fn current_source(base_path: &str) -> Option<SourceInfo> {
    let (md_path, pdf_path) = context_candidates(base_path);
    [md_path, pdf_path]
        .iter()
        .find(|p| p.is_file())
        .and_then(|p| SourceInfo::from_path(p).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_source_prefers_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("docs").display().to_string();
        assert!(current_source(&base).is_none());

        std::fs::write(format!("{}.pdf", base), b"%PDF").unwrap();
        std::fs::write(format!("{}.md", base), "# Docs\n").unwrap();

        let source = current_source(&base).unwrap();
        assert!(source.path.ends_with("docs.md"));
        assert_eq!(source.fingerprint.len(), 64);
    }

    #[tokio::test]
    async fn test_unsupported_provider_aborts_before_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::default();
        config.embeddings.provider = "openai".to_string();
        config.rag.context_file = dir.path().join("missing").display().to_string();
        config.rag.persist_dir = dir.path().join("db");

        let err = Pipeline::new(config).run().await.err().unwrap();
        assert_eq!(err.to_string(), "Unsupported embedding provider: openai");
        assert!(!dir.path().join("db").exists());
    }
}
