//! Paragraph-aware text chunker with overlap and locators.
//!
//! Splits a document into [`Chunk`]s of at most `max_tokens` tokens, where a
//! token is a whitespace-delimited word. Whole paragraphs are accumulated
//! until the next one would not fit; the following chunk then starts with
//! the last `overlap_tokens` tokens of the emitted one, so a fact that
//! straddles a cut is always fully contained in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Split the text into paragraphs on blank lines and tokenize each one.
//! 2. Append a paragraph to the current chunk if it fits within `max_tokens`.
//! 3. Otherwise emit the current chunk and seed the next one with its tail.
//!    The carried tail is shortened when the whole next paragraph would not
//!    fit next to it.
//! 4. A paragraph longer than `max_tokens` is hard-split at the token budget;
//!    every mid-paragraph cut carries at least one token of overlap.
//!
//! Chunk text is the canonical rendering of its tokens: words joined by a
//! single space, paragraphs by a blank line. [`reconstruct`] reverses the
//! split and yields [`canonical_text`] of the input.
//!
//! # Example
//!
//! ```rust
//! use doc_assistant_core::chunk::{chunk_text, ChunkingParams};
//! use doc_assistant_core::models::SectionMap;
//!
//! let params = ChunkingParams::default();
//! let chunks = chunk_text("notes.txt", "Hello world.\n\nSecond paragraph.", &SectionMap::default(), &params);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].locator, "notes.txt (chunk 0)");
//! assert!(chunks[0].overlap_text.is_empty());
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, ParsedDocument, SectionMap};

/// Chunk size limits, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Upper bound on tokens per chunk, overlap included.
    pub max_tokens: usize,
    /// Tokens carried from the end of one chunk into the next.
    pub overlap_tokens: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    word: &'a str,
    para_start: bool,
    heading: Option<&'a str>,
}

/// Chunk a parsed document using its own section map.
pub fn chunk_document(doc: &ParsedDocument, params: &ChunkingParams) -> Vec<Chunk> {
    chunk_text(&doc.source, &doc.text, &doc.sections, params)
}

/// Split `text` into ordered chunks tagged with `source` and locators.
///
/// Returns an empty vector for text with no tokens.
pub fn chunk_text(
    source: &str,
    text: &str,
    sections: &SectionMap,
    params: &ChunkingParams,
) -> Vec<Chunk> {
    let max = params.max_tokens.max(2);
    let overlap = params.overlap_tokens.min(max - 1);

    let mut builder = Builder {
        source,
        max,
        overlap,
        chunks: Vec::new(),
        current: Vec::new(),
        fresh: 0,
    };

    for paragraph in paragraphs(text) {
        let tokens = tokenize(text, paragraph, sections);
        if tokens.is_empty() {
            continue;
        }
        builder.push_paragraph(&tokens);
    }

    builder.finish()
}

/// Canonical rendering of `text`: single spaces between words, one blank
/// line between paragraphs.
pub fn canonical_text(text: &str) -> String {
    let sections = SectionMap::default();
    let tokens: Vec<Token<'_>> = paragraphs(text)
        .flat_map(|p| tokenize(text, p, &sections))
        .collect();
    render(&tokens)
}

/// Rebuild a document's canonical text from its chunks in `chunk_id` order.
///
/// Each chunk's leading overlap (the previous chunk's `overlap_text`) is
/// stripped. A chunk that carries no overlap always starts a new paragraph.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut prev_overlap: Option<&str> = None;
    for chunk in chunks {
        match prev_overlap {
            None => out.push_str(&chunk.text),
            Some("") => {
                out.push_str("\n\n");
                out.push_str(&chunk.text);
            }
            Some(overlap) => {
                out.push_str(chunk.text.strip_prefix(overlap).unwrap_or(&chunk.text));
            }
        }
        prev_overlap = Some(chunk.overlap_text.as_str());
    }
    out
}

/// Number of tokens in a chunk or snippet.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

struct Builder<'a, 's> {
    source: &'s str,
    max: usize,
    overlap: usize,
    chunks: Vec<Chunk>,
    current: Vec<Token<'a>>,
    /// Tokens in `current` that were not carried over from the previous chunk.
    fresh: usize,
}

impl<'a> Builder<'a, '_> {
    fn push_paragraph(&mut self, para: &[Token<'a>]) {
        if para.len() > self.max {
            self.push_oversized(para);
            return;
        }

        if self.current.len() + para.len() > self.max {
            let carry = self.overlap.min(self.max - para.len());
            self.emit(carry);
        }
        self.current.extend_from_slice(para);
        self.fresh += para.len();
    }

    fn push_oversized(&mut self, para: &[Token<'a>]) {
        if self.fresh > 0 {
            self.emit(self.overlap);
        }

        let mut rest = para;
        loop {
            let space = self.max - self.current.len();
            if rest.len() <= space {
                self.current.extend_from_slice(rest);
                self.fresh += rest.len();
                break;
            }
            self.current.extend_from_slice(&rest[..space]);
            self.fresh += space;
            rest = &rest[space..];
            // Mid-paragraph cut: always bridge it with overlap.
            self.emit(self.overlap.max(1));
        }
    }

    /// Emit `current` as a chunk and keep its last `carry` tokens.
    fn emit(&mut self, carry: usize) {
        if self.fresh == 0 {
            return;
        }

        let chunk_id = self.chunks.len() as i64;
        let first_fresh = self.current[self.current.len() - self.fresh];
        let locator = match first_fresh.heading {
            Some(heading) => format!("{} (chunk {})", heading, chunk_id),
            None => format!("{} (chunk {})", self.source, chunk_id),
        };
        self.chunks.push(make_chunk(
            self.source,
            chunk_id,
            locator,
            render(&self.current),
        ));

        let carry = carry.min(self.current.len());
        let tail = self.current.split_off(self.current.len() - carry);
        if let Some(last) = self.chunks.last_mut() {
            last.overlap_text = render(&tail);
        }
        self.current = tail;
        self.fresh = 0;
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.emit(0);
        self.chunks
    }
}

/// Paragraphs as slices of `text`, split on whitespace-only lines.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                spans.push((s, end));
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            end = offset;
        }
    }
    if let Some(s) = start {
        spans.push((s, end));
    }

    spans.into_iter().map(move |(s, e)| &text[s..e])
}

fn tokenize<'a>(text: &'a str, paragraph: &'a str, sections: &'a SectionMap) -> Vec<Token<'a>> {
    paragraph
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let offset = word.as_ptr() as usize - text.as_ptr() as usize;
            Token {
                word,
                para_start: i == 0,
                heading: sections.heading_at(offset),
            }
        })
        .collect()
}

fn render(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push_str(if token.para_start { "\n\n" } else { " " });
        }
        out.push_str(token.word);
    }
    out
}

fn make_chunk(source: &str, chunk_id: i64, locator: String, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        source: source.to_string(),
        chunk_id,
        locator,
        text,
        overlap_text: String::new(),
        hash,
    }
}
