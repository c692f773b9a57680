//! Core data models that flow through ingestion, retrieval, and memory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A heading and the byte offset in the document text where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub offset: usize,
    pub heading: String,
}

/// Ordered heading positions for one document, produced by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new(mut sections: Vec<Section>) -> Self {
        sections.sort_by_key(|s| s.offset);
        Self { sections }
    }

    /// The nearest heading at or before `offset`, if any.
    pub fn heading_at(&self, offset: usize) -> Option<&str> {
        let idx = self.sections.partition_point(|s| s.offset <= offset);
        if idx == 0 {
            None
        } else {
            Some(self.sections[idx - 1].heading.as_str())
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// A document after text extraction, ready for chunking.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Originating filename.
    pub source: String,
    /// Format tag the text was extracted from (`txt`, `md`, `pdf`).
    pub format: String,
    pub text: String,
    pub sections: SectionMap,
}

/// A retrievable span of document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Originating filename.
    pub source: String,
    /// Sequential id, unique within `source`, starting at 0.
    pub chunk_id: i64,
    /// Human-readable pointer used for citation display.
    pub locator: String,
    pub text: String,
    /// Tail of `text` repeated at the start of the next chunk. Empty for the
    /// last chunk of a document.
    pub overlap_text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

impl Chunk {
    /// Storage key, unique across the index.
    pub fn key(&self) -> String {
        format!("{}_{}", self.source, self.chunk_id)
    }
}

/// A source reference shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub locator: String,
    pub snippet: String,
    /// Cosine similarity of the underlying chunk to the query.
    pub score: f32,
}

/// Which long-term memory store a fact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Partition {
    User,
    Organization,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::User, Partition::Organization];

    /// Lenient parse of the labels an LLM might produce.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "USER" => Some(Partition::User),
            "ORGANIZATION" | "ORGANISATION" | "ORG" | "COMPANY" => Some(Partition::Organization),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::User => "user",
            Partition::Organization => "organization",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fact proposed by the extractor; consumed immediately by the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCandidate {
    pub content: String,
    pub target_partition: Partition,
    pub confidence: f32,
}

/// A persisted fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: String,
    pub partition: Partition,
}

/// One completed exchange in a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    /// `User: ...` / `Assistant: ...` transcript form.
    pub fn render(&self) -> String {
        format!("User: {}\nAssistant: {}", self.user, self.assistant)
    }
}

/// What the composer and extractor know besides the current message.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    /// Earlier turns, oldest first.
    pub history: Vec<Turn>,
    /// Facts loaded from long-term memory.
    pub known_facts: Vec<String>,
}

impl ConversationContext {
    /// Only the most recent turns are rendered into prompts.
    pub const MAX_RENDERED_TURNS: usize = 6;

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.known_facts.is_empty()
    }

    /// Render recent history as `User:` / `Assistant:` lines.
    pub fn render_history(&self) -> String {
        let skip = self.history.len().saturating_sub(Self::MAX_RENDERED_TURNS);
        self.history
            .iter()
            .skip(skip)
            .map(Turn::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
