//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait holds chunk embeddings and answers
//! nearest-neighbour queries. Backends: [`InMemoryVectorStore`](memory::InMemoryVectorStore)
//! here, and the SQLite store in the `doc-assistant` app crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Chunk;

/// A chunk together with its embedding, ready to be stored.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    /// Model that produced `vector`.
    pub model: String,
}

/// A stored chunk matched by a vector query.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// Insertion sequence, used to break score ties.
    pub seq: i64,
}

/// Abstract vector backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert records, replacing any with the same chunk key |
/// | [`query`](VectorStore::query) | Top-`k` records by cosine similarity |
/// | [`len`](VectorStore::len) | Number of stored records |
///
/// Replacing a record keeps its original insertion sequence.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Highest-scoring records first; ties in insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Ordering used by every backend: score descending, then insertion order.
pub fn rank_hits(hits: &mut Vec<VectorHit>, k: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
    hits.truncate(k);
}
