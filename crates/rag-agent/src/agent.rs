//! RAG orchestrator
//!
//! Retrieves the top-k chunks for an input, stuffs them into the system
//! prompt's `{context}` placeholder, renders the human prompt with `{input}`
//! and asks the language model. Failures are captured per query in the
//! returned [`AgentResponse`]; `run` never returns an error.

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::generation::{stuff_context, ChatPromptTemplate};
use crate::providers::LlmProvider;
use crate::retrieval::{Retriever, VectorStoreRepository};
use crate::types::AgentResponse;

/// Retrieval-augmented question answering agent
pub struct RagAgent {
    name: String,
    prompt: ChatPromptTemplate,
    retriever: Retriever,
    llm: Arc<dyn LlmProvider>,
    test_cases: Vec<String>,
}

impl RagAgent {
    /// Build the agent; the store must already be loaded or saved
    pub fn new(
        config: &AgentConfig,
        store: &dyn VectorStoreRepository,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let retriever = store.as_retriever(config.rag.retriever_k)?;
        tracing::info!(
            "RAG chain created (k={}, model={})",
            retriever.k(),
            llm.model_name()
        );

        Ok(Self {
            name: config.name.clone(),
            prompt: ChatPromptTemplate::from_config(&config.prompts),
            retriever,
            llm,
            test_cases: config.test_cases.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Answer one input
    pub async fn run(&self, input: &str) -> AgentResponse {
        match self.answer(input).await {
            Ok((output, source_documents)) => AgentResponse::success(input, output, source_documents),
            Err(e) => {
                tracing::error!("Error processing input '{}': {}", input, e);
                AgentResponse::failure(input, e)
            }
        }
    }

    async fn answer(&self, input: &str) -> Result<(String, usize)> {
        let documents = self.retriever.retrieve(input).await?;
        let context = stuff_context(&documents);
        let messages = self.prompt.format_rag(&context, input)?;
        let output = self.llm.generate(&messages).await?;
        Ok((output, documents.len()))
    }

    /// Answer several inputs in order; one failure does not stop the rest
    pub async fn run_batch<S: AsRef<str>>(&self, inputs: &[S]) -> Vec<AgentResponse> {
        let mut responses = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            tracing::info!("Processing input {}/{}", i + 1, inputs.len());
            responses.push(self.run(input.as_ref()).await);
        }
        responses
    }

    /// Run the configured test cases
    pub async fn run_test_cases(&self) -> Vec<AgentResponse> {
        if self.test_cases.is_empty() {
            tracing::warn!("No test cases found in configuration");
            return Vec::new();
        }

        tracing::info!("Running {} test cases...", self.test_cases.len());
        self.run_batch(&self.test_cases).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generation::ChatMessage;
    use crate::providers::EmbeddingProvider;
    use crate::retrieval::LocalVectorStore;
    use crate::types::{Chunk, Document};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(vec![
                lower.matches('x').count() as f32,
                lower.matches('y').count() as f32,
                1.0,
            ])
        }

        fn model_name(&self) -> &str {
            "letters"
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    /// Replies with the rendered system prompt
    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            Ok(messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join(" | "))
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    /// Fails on inputs containing "boom"
    struct FlakyLlm;

    #[async_trait]
    impl LlmProvider for FlakyLlm {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            match messages.last() {
                Some(m) if m.content.contains("boom") => Err(Error::llm("connection refused")),
                _ => Ok("ok".to_string()),
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    fn config(k: usize) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.prompts.system = "Context: {context}".to_string();
        config.prompts.human = "Q: {input}".to_string();
        config.rag.retriever_k = k;
        config
    }

    async fn built_store(dir: &TempDir) -> LocalVectorStore {
        let store = LocalVectorStore::new(dir.path().join("db"), Arc::new(LetterEmbedder));
        let chunks: Vec<Chunk> = ["X is a thing", "Y is another"]
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::from_document(Document::new(*t), i))
            .collect();
        store.save(&chunks).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_agent_requires_initialized_store() {
        let dir = TempDir::new().unwrap();
        let store = LocalVectorStore::new(dir.path().join("db"), Arc::new(LetterEmbedder));

        let result = RagAgent::new(&config(3), &store, Arc::new(EchoLlm));
        assert!(matches!(result, Err(Error::UninitializedStore)));
    }

    #[tokio::test]
    async fn test_run_stuffs_context() {
        let dir = TempDir::new().unwrap();
        let store = built_store(&dir).await;
        let agent = RagAgent::new(&config(1), &store, Arc::new(EchoLlm)).unwrap();

        let response = agent.run("What is X?").await;
        assert!(response.is_success());
        assert_eq!(response.source_documents, 1);
        assert_eq!(response.output, "Context: X is a thing | Q: What is X?");
    }

    #[tokio::test]
    async fn test_source_count_is_bounded_by_store_size() {
        let dir = TempDir::new().unwrap();
        let store = built_store(&dir).await;
        let agent = RagAgent::new(&config(3), &store, Arc::new(EchoLlm)).unwrap();

        assert_eq!(agent.run("anything").await.source_documents, 2);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let store = built_store(&dir).await;
        let agent = RagAgent::new(&config(2), &store, Arc::new(FlakyLlm)).unwrap();

        let responses = agent.run_batch(&["first", "boom", "third"]).await;
        assert_eq!(responses.len(), 3);
        assert!(responses[0].is_success());
        assert_eq!(responses[1].output, "");
        assert_eq!(responses[1].source_documents, 0);
        assert_eq!(responses[1].error.as_deref(), Some("LLM error: connection refused"));
        assert!(responses[2].is_success());
    }

    #[tokio::test]
    async fn test_prompt_error_is_captured() {
        let dir = TempDir::new().unwrap();
        let store = built_store(&dir).await;
        let mut config = config(1);
        config.prompts.system = "{context} {unknown}".to_string();
        let agent = RagAgent::new(&config, &store, Arc::new(EchoLlm)).unwrap();

        let response = agent.run("x").await;
        assert!(!response.is_success());
        assert!(response.error.unwrap().contains("{unknown}"));
    }

    #[tokio::test]
    async fn test_no_test_cases() {
        let dir = TempDir::new().unwrap();
        let store = built_store(&dir).await;
        let agent = RagAgent::new(&config(1), &store, Arc::new(EchoLlm)).unwrap();

        assert!(agent.run_test_cases().await.is_empty());
    }
}
