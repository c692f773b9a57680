//! In-memory [`VectorStore`] for tests and ephemeral sessions.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; queries are
//! brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{rank_hits, VectorHit, VectorRecord, VectorStore};

struct StoredVector {
    record: VectorRecord,
    seq: i64,
}

#[derive(Default)]
struct Inner {
    records: Vec<StoredVector>,
    by_key: HashMap<String, usize>,
    next_seq: i64,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for record in records {
            let key = record.chunk.key();
            match inner.by_key.get(&key).copied() {
                Some(idx) => inner.records[idx].record = record.clone(),
                None => {
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    let idx = inner.records.len();
                    inner.records.push(StoredVector {
                        record: record.clone(),
                        seq,
                    });
                    inner.by_key.insert(key, idx);
                }
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let inner = self.inner.read().unwrap();
        let mut hits: Vec<VectorHit> = inner
            .records
            .iter()
            .map(|sv| VectorHit {
                chunk: sv.record.chunk.clone(),
                score: cosine_similarity(vector, &sv.record.vector),
                seq: sv.seq,
            })
            .collect();
        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().unwrap().records.len())
    }
}
