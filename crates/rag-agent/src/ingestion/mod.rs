//! Document ingestion: source detection, loading and chunking

pub mod chunker;
pub mod loader;
pub mod splitter;

pub use chunker::ChunkingStrategy;
pub use loader::{
    context_candidates, fingerprint_file, resolve_context_path, DocumentLoader, LoaderRegistry,
    MarkdownLoader, PdfLoader,
};
pub use splitter::{MarkdownHeaderSplitter, RecursiveCharacterSplitter};
