//! Text splitters
//!
//! [`RecursiveCharacterSplitter`] bounds chunk length by trying progressively
//! finer separators (paragraph, line, word, character) and packing the pieces
//! back up to `chunk_size`. Each chunk after the first opens with at least
//! `chunk_overlap` characters of the previous chunk's tail.
//! [`MarkdownHeaderSplitter`] cuts markdown into one section per heading run.
//! All lengths are counted in characters, not bytes.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

use crate::error::{Error, Result};
use crate::types::Document;

/// Separators tried in order, coarsest first
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Deepest heading level that starts a new section
const MAX_HEADER_LEVEL: usize = 3;

/// Half-open character range into the text being split
type Span = (usize, usize);

/// Size-bounded splitter with overlap
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Characters of trailing context carried into the next chunk
    chunk_overlap: usize,
    /// Separators, coarsest first
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter with the default separators
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split raw text into non-empty chunks of at most `chunk_size` characters.
    ///
    /// Consecutive chunks share at least `min(chunk_overlap, previous chunk
    /// length)` characters: the next chunk starts inside the previous one,
    /// moved back to a word start when that still fits.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.trim().chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut units = Vec::new();
        self.collect_units(&chars, (0, chars.len()), &self.separators, &mut units);

        self.pack(&chars, &units)
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }

    /// Split each document, carrying its metadata onto every piece
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(move |content| Document {
                        content,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }

    /// New text a chunk can take on top of its overlap
    fn unit_budget(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Cut `span` into units of at most `unit_budget` characters at the
    /// coarsest separator present. Units tile the span and every unit after
    /// the first starts with its separator.
    fn collect_units(&self, chars: &[char], span: Span, separators: &[String], units: &mut Vec<Span>) {
        let (start, end) = span;
        if end - start <= self.unit_budget() {
            units.push(span);
            return;
        }

        for (i, separator) in separators.iter().enumerate() {
            let needle: Vec<char> = separator.chars().collect();
            if needle.is_empty() {
                break;
            }

            let cuts = find_all(&chars[start..end], &needle);
            if cuts.is_empty() {
                continue;
            }

            let finer = &separators[i + 1..];
            let mut piece_start = start;
            for cut in cuts.into_iter().map(|at| start + at).chain(std::iter::once(end)) {
                if cut <= piece_start {
                    continue;
                }

                // A separator that tips its piece over budget becomes a unit of its own
                let mut body_start = piece_start;
                if cut - piece_start > self.unit_budget() && chars[piece_start..cut].starts_with(&needle) {
                    body_start += needle.len();
                    self.collect_units(chars, (piece_start, body_start), finer, units);
                }
                if cut > body_start {
                    self.collect_units(chars, (body_start, cut), finer, units);
                }
                piece_start = cut;
            }
            return;
        }

        units.extend((start..end).map(|at| (at, at + 1)));
    }

    /// Greedily pack units into chunks, each opening with the previous tail
    fn pack(&self, chars: &[char], units: &[Span]) -> Vec<Span> {
        let mut chunks: Vec<Span> = Vec::new();
        let mut next = 0usize;

        while next < units.len() {
            let start = match chunks.last() {
                None => units[next].0,
                Some(&(prev_start, prev_end)) if self.chunk_overlap > 0 => {
                    self.overlap_start(chars, (prev_start, prev_end), units[next].1)
                }
                Some(_) => {
                    // Without overlap the gap between chunks is dropped
                    let start = skip_whitespace(chars, units[next].0);
                    while units[next].1 <= start {
                        next += 1;
                    }
                    start
                }
            };

            let mut end = units[next].1;
            next += 1;
            while let Some(&(_, candidate)) = units.get(next) {
                if candidate - start > self.chunk_size {
                    break;
                }
                end = candidate;
                next += 1;
            }

            // Trailing whitespace only matters when the next chunk overlaps it
            if self.chunk_overlap == 0 {
                while end > start && chars[end - 1].is_whitespace() {
                    end -= 1;
                }
            }

            chunks.push((start, end));
        }

        chunks
    }

    /// Start of the chunk following `prev` whose first unit ends at `first_end`.
    ///
    /// Units never exceed `chunk_size - chunk_overlap`, so the exact cut
    /// `chunk_overlap` characters before the previous end always fits.
    fn overlap_start(&self, chars: &[char], prev: Span, first_end: usize) -> usize {
        let (prev_start, prev_end) = prev;
        let exact = prev_end.saturating_sub(self.chunk_overlap).max(prev_start);

        let mut word = exact;
        while word > prev_start && !is_word_start(chars, word) {
            word -= 1;
        }

        if is_word_start(chars, word) && first_end - word <= self.chunk_size {
            word
        } else {
            exact
        }
    }
}

/// Splits markdown at level 1-3 headings, headings kept in the section text
#[derive(Debug, Clone, Default)]
pub struct MarkdownHeaderSplitter;

/// A heading located in the source text
struct HeadingMark {
    /// Byte offset where the heading starts
    start: usize,
    /// Byte offset just past the heading
    end: usize,
    /// 1-based heading level
    level: usize,
    /// Plain heading text
    title: String,
}

impl MarkdownHeaderSplitter {
    /// Create a splitter for `#`, `##` and `###`
    pub fn new() -> Self {
        Self
    }

    /// Metadata key for a heading level, e.g. `Header 2`
    pub fn header_key(level: usize) -> String {
        format!("Header {}", level)
    }

    /// Split one markdown text into sections.
    ///
    /// Returns no sections when the text has no level 1-3 headings. Text before
    /// the first heading becomes a section without header metadata. A heading
    /// with no body of its own followed by a deeper heading is folded into
    /// that deeper section.
    pub fn split_text(&self, text: &str) -> Vec<Document> {
        let headings = Self::find_headings(text);
        if headings.is_empty() {
            return Vec::new();
        }

        let mut sections = Vec::new();

        let preamble = text[..headings[0].start].trim();
        if !preamble.is_empty() {
            sections.push(Document::new(preamble));
        }

        let mut trail: [Option<&str>; MAX_HEADER_LEVEL] = [None; MAX_HEADER_LEVEL];
        let mut folded_start: Option<usize> = None;

        for (i, heading) in headings.iter().enumerate() {
            let next = headings.get(i + 1);
            let end = next.map_or(text.len(), |next| next.start);

            trail[heading.level - 1] = Some(heading.title.as_str());
            for deeper in trail.iter_mut().skip(heading.level) {
                *deeper = None;
            }

            let bare = text[heading.end.min(end)..end].trim().is_empty();
            if bare && next.is_some_and(|next| next.level > heading.level) {
                folded_start.get_or_insert(heading.start);
                continue;
            }

            let start = folded_start.take().unwrap_or(heading.start);
            let content = text[start..end].trim();
            if content.is_empty() {
                continue;
            }

            let mut section = Document::new(content);
            for (depth, title) in trail.iter().enumerate() {
                if let Some(title) = title {
                    section = section.with_metadata(Self::header_key(depth + 1), *title);
                }
            }
            sections.push(section);
        }

        sections
    }

    /// Split each document, merging its metadata under the header metadata
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content).into_iter().map(move |mut section| {
                    for (key, value) in &doc.metadata {
                        section.metadata.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                    section
                })
            })
            .collect()
    }

    fn find_headings(text: &str) -> Vec<HeadingMark> {
        let mut headings = Vec::new();
        let mut open: Option<HeadingMark> = None;

        for (event, range) in Parser::new(text).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    open = Some(HeadingMark {
                        start: line_start(text, range.start),
                        end: range.end,
                        level: heading_level(level),
                        title: String::new(),
                    });
                }
                Event::Text(t) | Event::Code(t) => {
                    if let Some(heading) = open.as_mut() {
                        heading.title.push_str(&t);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(mut heading) = open.take() {
                        heading.end = range.end;
                        if heading.level <= MAX_HEADER_LEVEL {
                            headings.push(heading);
                        }
                    }
                }
                _ => {}
            }
        }

        headings
    }
}

fn heading_level(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Back up to the start of the line containing `offset`
fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |pos| pos + 1)
}

/// Non-overlapping match positions of `needle` in `haystack`
fn find_all(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut found = Vec::new();
    let mut at = 0usize;
    while at + needle.len() <= haystack.len() {
        if haystack[at..at + needle.len()] == *needle {
            found.push(at);
            at += needle.len();
        } else {
            at += 1;
        }
    }
    found
}

fn skip_whitespace(chars: &[char], mut at: usize) -> usize {
    while chars.get(at).is_some_and(|c| c.is_whitespace()) {
        at += 1;
    }
    at
}

fn is_word_start(chars: &[char], at: usize) -> bool {
    chars.get(at).is_some_and(|c| !c.is_whitespace())
        && (at == 0 || chars[at - 1].is_whitespace())
}
