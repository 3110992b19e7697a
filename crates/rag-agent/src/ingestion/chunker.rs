//! Chunking strategy selection
//!
//! Markdown sources with header splitting enabled are cut at headings first
//! and then size-bounded; everything else is size-bounded directly.

use std::path::Path;

use crate::config::RagSettings;
use crate::error::Result;
use crate::types::{Chunk, Document, FileType};

use super::splitter::{MarkdownHeaderSplitter, RecursiveCharacterSplitter};

/// Chunking strategies
#[derive(Debug, Clone)]
pub enum ChunkingStrategy {
    /// Size-bounded recursive splitting only
    Recursive(RecursiveCharacterSplitter),
    /// Header sections first, then size-bounded splitting of each section
    MarkdownHeaders {
        headers: MarkdownHeaderSplitter,
        splitter: RecursiveCharacterSplitter,
    },
}

impl ChunkingStrategy {
    /// Select a strategy for the resolved source file
    pub fn select(
        path: &Path,
        chunk_size: usize,
        chunk_overlap: usize,
        use_md_headers: bool,
    ) -> Result<Self> {
        let splitter = RecursiveCharacterSplitter::new(chunk_size, chunk_overlap)?;

        if use_md_headers && FileType::from_path(path) == FileType::Markdown {
            Ok(Self::MarkdownHeaders {
                headers: MarkdownHeaderSplitter::new(),
                splitter,
            })
        } else {
            Ok(Self::Recursive(splitter))
        }
    }

    /// Select a strategy from the retrieval settings
    pub fn from_config(path: &Path, settings: &RagSettings) -> Result<Self> {
        Self::select(
            path,
            settings.chunk_size,
            settings.chunk_overlap,
            settings.use_md_headers,
        )
    }

    /// Strategy name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Recursive(_) => "recursive",
            Self::MarkdownHeaders { .. } => "markdown-headers",
        }
    }

    /// Split documents into chunks
    pub fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        let pieces = match self {
            Self::Recursive(splitter) => {
                tracing::info!("Using recursive character splitting");
                splitter.split_documents(documents)
            }
            Self::MarkdownHeaders { headers, splitter } => {
                tracing::info!("Using header-based splitting for Markdown (preserves structure)");
                let sections = headers.split_documents(documents);
                tracing::info!("Header-based splitting created {} sections", sections.len());

                if sections.is_empty() {
                    tracing::warn!("Header splitting produced no results, using standard splitting");
                    splitter.split_documents(documents)
                } else {
                    splitter.split_documents(&sections)
                }
            }
        };

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, doc)| Chunk::from_document(doc, index))
            .collect();

        tracing::info!("Created {} chunks", chunks.len());
        chunks
    }
}
