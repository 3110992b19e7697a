//! Core types for the RAG agent

pub mod document;
pub mod response;

pub use document::{Chunk, Document, FileType};
pub use response::AgentResponse;
