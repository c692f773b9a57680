//! Near-duplicate detection for memory entries.
//!
//! The default [`LexicalSimilarity`] compares normalized token sets with
//! Jaccard similarity. Normalization lowercases, strips punctuation, drops
//! stopwords and subject words ("i", "user", "we", ...) and applies a naive
//! plural/verb `s` stem, so "I prefer weekly summaries on Mondays" and
//! "User prefers weekly summaries on Mondays." normalize identically.
//!
//! [`EmbeddingSimilarity`] instead compares embeddings by cosine similarity.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};

/// Similarity score in `[0.0, 1.0]` between two memory statements.
#[async_trait]
pub trait Similarity: Send + Sync {
    fn name(&self) -> &str;
    async fn similarity(&self, a: &str, b: &str) -> Result<f32>;
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "by", "from",
    "is", "are", "was", "were", "be", "been", "am", "it", "its", "this", "that", "these", "those",
    "as", "so", "very", "really", "also", "just", "has", "have", "had", "do", "does",
];

const SUBJECT_WORDS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "user", "we", "us", "our", "ours", "you", "your",
];

/// Normalized content tokens of `text`.
pub fn normalize(text: &str) -> BTreeSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| !is_noise(w))
        .map(stem)
        .filter(|w| !is_noise(w))
        .collect()
}

fn is_noise(word: &str) -> bool {
    STOPWORDS.contains(&word) || SUBJECT_WORDS.contains(&word)
}

fn stem(word: &str) -> String {
    if word.len() > 4 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Jaccard similarity of the normalized token sets.
///
/// Two statements with no content tokens are identical only if their
/// trimmed, lowercased text is.
pub fn lexical_similarity(a: &str, b: &str) -> f32 {
    let ta = normalize(a);
    let tb = normalize(b);
    if ta.is_empty() && tb.is_empty() {
        return if a.trim().to_lowercase() == b.trim().to_lowercase() {
            1.0
        } else {
            0.0
        };
    }

    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f32 / union as f32
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarity;

#[async_trait]
impl Similarity for LexicalSimilarity {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        Ok(lexical_similarity(a, b))
    }
}

/// Cosine similarity of embeddings, clamped to `[0.0, 1.0]`.
pub struct EmbeddingSimilarity {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Similarity for EmbeddingSimilarity {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let vectors = self.embedder.embed(&[a.to_string(), b.to_string()]).await?;
        if vectors.len() != 2 {
            anyhow::bail!("expected 2 embeddings, got {}", vectors.len());
        }
        Ok(cosine_similarity(&vectors[0], &vectors[1]).clamp(0.0, 1.0))
    }
}
