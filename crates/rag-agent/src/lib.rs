//! rag-agent: configuration-driven retrieval-augmented generation
//!
//! A YAML file selects prompts, models and chunking. The context source
//! (`{context_file}.md` or `.pdf`) is split into chunks, embedded and
//! persisted once; later runs load the persisted index and go straight to
//! answering the configured test cases with a local Ollama model.

pub mod agent;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod retrieval;
pub mod types;

pub use agent::RagAgent;
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use types::{
    document::{Chunk, Document, FileType},
    response::AgentResponse,
};
