//! Context source detection and format-specific loading
//!
//! Loaders are held in an ordered registry of strategies. The first strategy
//! whose `supports` accepts a path wins, and [`LoaderRegistry::register`]
//! prepends, so custom formats take priority over the built-in markdown and
//! PDF loaders.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::document::{Document, FileType, META_PAGE, META_TOTAL_PAGES};

/// A format-specific document loader
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader handles the given path
    fn supports(&self, path: &Path) -> bool;

    /// Load documents from the given path
    fn load(&self, path: &Path) -> Result<Vec<Document>>;

    /// Loader name for logging
    fn name(&self) -> &str;
}

/// Loads a markdown file verbatim as a single document, headers included
pub struct MarkdownLoader;

impl DocumentLoader for MarkdownLoader {
    fn supports(&self, path: &Path) -> bool {
        FileType::from_path(path) == FileType::Markdown
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        tracing::info!("Loading Markdown file: {}", display_name(path));
        let data = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&data).to_string();
        Ok(vec![Document::from_source(content, path)])
    }

    fn name(&self) -> &str {
        "markdown"
    }
}

/// Loads a PDF with one document per page
pub struct PdfLoader;

impl PdfLoader {
    /// Page-by-page extraction through lopdf
    fn load_pages(path: &Path) -> Result<Vec<Document>> {
        let pdf = lopdf::Document::load(path)
            .map_err(|e| Error::file_parse(display_name(path), e.to_string()))?;

        let pages = pdf.get_pages();
        let total_pages = pages.len();
        let mut documents = Vec::with_capacity(total_pages);

        for page_number in pages.keys() {
            let text = match pdf.extract_text(&[*page_number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Failed to extract text from page {} of {}: {}",
                        page_number,
                        display_name(path),
                        e
                    );
                    String::new()
                }
            };

            documents.push(
                Document::from_source(text, path)
                    .with_metadata(META_PAGE, page_number.to_string())
                    .with_metadata(META_TOTAL_PAGES, total_pages.to_string()),
            );
        }

        Ok(documents)
    }

    /// Whole-document extraction, used when lopdf cannot walk the page tree
    fn load_whole(path: &Path) -> Result<Vec<Document>> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| Error::file_parse(display_name(path), e.to_string()))?;

        Ok(vec![Document::from_source(text, path)
            .with_metadata(META_PAGE, "1")
            .with_metadata(META_TOTAL_PAGES, "1")])
    }
}

impl DocumentLoader for PdfLoader {
    fn supports(&self, path: &Path) -> bool {
        FileType::from_path(path) == FileType::Pdf
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        tracing::info!("Loading PDF file: {}", display_name(path));

        match Self::load_pages(path) {
            Ok(pages) if !pages.is_empty() => Ok(pages),
            Ok(_) => {
                tracing::warn!("PDF has no pages in its page tree, extracting as a whole");
                Self::load_whole(path)
            }
            Err(e) => {
                tracing::warn!("Page-level PDF parsing failed ({}), extracting as a whole", e);
                Self::load_whole(path)
            }
        }
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Ordered list of loader strategies
pub struct LoaderRegistry {
    strategies: Vec<Box<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(MarkdownLoader), Box::new(PdfLoader)],
        }
    }
}

impl LoaderRegistry {
    /// Registry with no strategies at all
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Register a strategy ahead of all existing ones
    pub fn register(&mut self, strategy: Box<dyn DocumentLoader>) {
        self.strategies.insert(0, strategy);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_strategy(mut self, strategy: Box<dyn DocumentLoader>) -> Self {
        self.register(strategy);
        self
    }

    /// Strategy names in priority order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First strategy that supports the path
    pub fn for_path(&self, path: &Path) -> Result<&dyn DocumentLoader> {
        self.strategies
            .iter()
            .find(|s| s.supports(path))
            .map(|s| &**s)
            .ok_or_else(|| {
                Error::UnsupportedFileType(
                    path.extension()
                        .map(|e| format!(".{}", e.to_string_lossy()))
                        .unwrap_or_else(|| path.display().to_string()),
                )
            })
    }

    /// Resolve the context source and load it
    pub fn detect_and_load(&self, base_path: &str) -> Result<(PathBuf, Vec<Document>)> {
        let path = resolve_context_path(base_path)?;
        let documents = self.for_path(&path)?.load(&path)?;
        tracing::info!("Loaded {} document(s)", documents.len());
        Ok((path, documents))
    }
}

/// The two accepted context sources, in preference order
pub fn context_candidates(base_path: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}.md", base_path)),
        PathBuf::from(format!("{}.pdf", base_path)),
    )
}

/// Pick `{base}.md` or `{base}.pdf`, preferring markdown when both exist
pub fn resolve_context_path(base_path: &str) -> Result<PathBuf> {
    let (md_path, pdf_path) = context_candidates(base_path);

    match (md_path.is_file(), pdf_path.is_file()) {
        (true, true) => {
            tracing::warn!("Both .md and .pdf found. Using .md (better structure preservation)");
            Ok(md_path)
        }
        (true, false) => {
            tracing::info!("Using Markdown file (better for structured content)");
            Ok(md_path)
        }
        (false, true) => {
            tracing::info!("Using PDF file");
            Ok(pdf_path)
        }
        (false, false) => Err(Error::ContextNotFound {
            markdown: absolute(&md_path),
            pdf: absolute(&pdf_path),
        }),
    }
}

/// SHA-256 of a file's bytes, hex encoded
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn base_in(dir: &tempfile::TempDir) -> String {
        dir.path().join("docs").display().to_string()
    }

    #[test]
    fn test_resolve_prefers_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_in(&dir);
        fs::write(format!("{}.md", base), "# Title").unwrap();
        fs::write(format!("{}.pdf", base), b"%PDF-1.5").unwrap();

        assert_eq!(resolve_context_path(&base).unwrap(), PathBuf::from(format!("{}.md", base)));
    }

    #[test]
    fn test_resolve_single_format() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_in(&dir);

        fs::write(format!("{}.pdf", base), b"%PDF-1.5").unwrap();
        assert_eq!(resolve_context_path(&base).unwrap(), PathBuf::from(format!("{}.pdf", base)));

        fs::remove_file(format!("{}.pdf", base)).unwrap();
        fs::write(format!("{}.md", base), "text").unwrap();
        assert_eq!(resolve_context_path(&base).unwrap(), PathBuf::from(format!("{}.md", base)));
    }

    #[test]
    fn test_resolve_neither_is_context_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_in(&dir);

        match resolve_context_path(&base).unwrap_err() {
            Error::ContextNotFound { markdown, pdf } => {
                assert!(markdown.ends_with("docs.md"));
                assert!(pdf.ends_with("docs.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_markdown_loader_keeps_structure() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_in(&dir);
        fs::write(format!("{}.md", base), "# Title\n\nBody text.\n").unwrap();

        let (path, docs) = LoaderRegistry::default().detect_and_load(&base).unwrap();

        assert_eq!(FileType::from_path(&path), FileType::Markdown);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "# Title\n\nBody text.\n");
        assert_eq!(docs[0].source(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn test_pdf_loader_emits_one_document_per_page() {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.pdf");

        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for text in ["First page", "Second page"] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        pdf.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.save(&path).unwrap();

        let docs = PdfLoader.load(&path).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get(META_PAGE).map(String::as_str), Some("1"));
        assert_eq!(docs[1].metadata.get(META_PAGE).map(String::as_str), Some("2"));
        assert_eq!(docs[1].metadata.get(META_TOTAL_PAGES).map(String::as_str), Some("2"));
    }

    struct TextLoader;

    impl DocumentLoader for TextLoader {
        fn supports(&self, path: &Path) -> bool {
            // Claims markdown too, to prove registration order wins
            matches!(FileType::from_path(path), FileType::Markdown | FileType::Other(_))
        }

        fn load(&self, path: &Path) -> Result<Vec<Document>> {
            Ok(vec![Document::from_source("custom", path)])
        }

        fn name(&self) -> &str {
            "text"
        }
    }

    #[test]
    fn test_registered_strategy_takes_priority() {
        let registry = LoaderRegistry::default().with_strategy(Box::new(TextLoader));

        assert_eq!(registry.strategy_names(), vec!["text", "markdown", "pdf"]);
        assert_eq!(registry.for_path(Path::new("a.md")).unwrap().name(), "text");
        assert_eq!(registry.for_path(Path::new("a.pdf")).unwrap().name(), "pdf");
    }

    #[test]
    fn test_for_path_unsupported() {
        let registry = LoaderRegistry::default();
        let err = registry.for_path(Path::new("notes.docx")).err().unwrap();
        assert!(matches!(err, Error::UnsupportedFileType(ref ext) if ext == ".docx"));
        assert!(LoaderRegistry::empty().for_path(Path::new("a.md")).is_err());
    }
}
