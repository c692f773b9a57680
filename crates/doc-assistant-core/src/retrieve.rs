//! Query-time retrieval: index hits to display-ready citations.

use crate::error::AssistantError;
use crate::index::Index;
use crate::models::Citation;

/// A retrieved chunk: its citation plus the full text used for grounding.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub citation: Citation,
    pub text: String,
}

/// Retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Maximum citations returned.
    pub top_k: usize,
    /// Snippet length budget in characters, before the trailing `...`.
    pub snippet_chars: usize,
    /// Hits scoring below this are dropped. `None` keeps every hit.
    pub min_score: Option<f32>,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            snippet_chars: 200,
            min_score: None,
        }
    }
}

/// Result of a retrieval: either passages, or a clean "nothing found".
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Best match first. Never empty.
    Found(Vec<Passage>),
    NoRelevantContent,
}

impl Retrieval {
    pub fn citations(&self) -> Vec<Citation> {
        match self {
            Retrieval::Found(passages) => passages.iter().map(|p| p.citation.clone()).collect(),
            Retrieval::NoRelevantContent => Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    index: Index,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(index: Index, params: RetrievalParams) -> Self {
        Self { index, params }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, AssistantError> {
        if query.trim().is_empty() {
            return Ok(Retrieval::NoRelevantContent);
        }

        let hits = self.index.query(query, self.params.top_k).await?;
        let passages: Vec<Passage> = hits
            .into_iter()
            .filter(|h| self.params.min_score.map_or(true, |min| h.score >= min))
            .map(|h| Passage {
                citation: Citation {
                    snippet: truncate_snippet(&h.chunk.text, self.params.snippet_chars),
                    source: h.chunk.source,
                    locator: h.chunk.locator,
                    score: h.score,
                },
                text: h.chunk.text,
            })
            .collect();

        if passages.is_empty() {
            Ok(Retrieval::NoRelevantContent)
        } else {
            Ok(Retrieval::Found(passages))
        }
    }
}

/// Cut `text` to at most `max_chars` characters at a word boundary and
/// append `...`. Text that already fits is returned whole. Words are never
/// split: a first word longer than the budget is kept intact.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let Some((cut, next)) = flat.char_indices().nth(max_chars) else {
        return flat;
    };

    let head = if next == ' ' {
        &flat[..cut]
    } else {
        match flat[..cut].rfind(' ') {
            Some(space) => &flat[..space],
            None => flat.split(' ').next().unwrap_or_default(),
        }
    };
    if head.len() == flat.len() {
        return flat;
    }
    format!("{}...", head)
}
