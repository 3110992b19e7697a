//! Document and chunk types with source metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Metadata key holding the source file path
pub const META_SOURCE: &str = "source";
/// Metadata key holding the 1-indexed page number (PDF)
pub const META_PAGE: &str = "page";
/// Metadata key holding the page count (PDF)
pub const META_TOTAL_PAGES: &str = "total_pages";

/// Context source file types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Markdown file
    Markdown,
    /// PDF document
    Pdf,
    /// Anything else, keyed by lowercase extension
    Other(String),
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            other => Self::Other(other.to_string()),
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default(),
        )
    }
}

/// A unit of loaded text with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content
    pub content: String,
    /// Source path, page number, header trail, ...
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a document tagged with its source path
    pub fn from_source(content: impl Into<String>, source: &Path) -> Self {
        Self::new(content).with_metadata(META_SOURCE, source.display().to_string())
    }

    /// Builder-style metadata insert
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Source path recorded by the loader, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A bounded-length piece of a document; the unit stored in the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk ID
    pub id: Uuid,
    /// Position in the chunk sequence produced for the source
    pub index: usize,
    /// Text content
    pub content: String,
    /// Metadata inherited from the document it was cut from
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Create a chunk from a split document
    pub fn from_document(doc: Document, index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            content: doc.content,
            metadata: doc.metadata,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Source path recorded by the loader, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// View the chunk as a plain document, dropping its identity
    pub fn to_document(&self) -> Document {
        Document {
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
