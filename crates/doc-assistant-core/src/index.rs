//! Embeds chunks into a [`VectorStore`] and answers similarity queries.
//!
//! [`Index::add`] embeds in batches. When a batch fails, its chunks are
//! retried one at a time so a single bad chunk does not drop its
//! neighbours; chunks that still fail are reported and skipped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::{embed_one, Embedder};
use crate::error::AssistantError;
use crate::models::Chunk;
use crate::store::{VectorHit, VectorRecord, VectorStore};

/// Outcome of [`Index::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub indexed: usize,
    pub failed: usize,
    /// One message per failed chunk, prefixed with its key.
    pub errors: Vec<String>,
}

/// Chunk index over an embedder and a vector store.
#[derive(Clone)]
pub struct Index {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Index {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and store `chunks`. Chunks with the same key as an existing
    /// record replace it.
    ///
    /// Embedding failures are per chunk and end up in the report. A store
    /// write failure aborts the call.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<AddReport, AssistantError> {
        let mut report = AddReport::default();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = match self.embedder.embed(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => vectors
                    .into_iter()
                    .map(Some)
                    .collect::<Vec<Option<Vec<f32>>>>(),
                Ok(vectors) => {
                    warn!(
                        expected = batch.len(),
                        got = vectors.len(),
                        "embedding batch size mismatch, retrying chunks individually"
                    );
                    self.embed_individually(batch, &mut report).await
                }
                Err(e) => {
                    warn!(error = %e, "embedding batch failed, retrying chunks individually");
                    self.embed_individually(batch, &mut report).await
                }
            };

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .filter_map(|(chunk, vector)| {
                    vector.map(|vector| VectorRecord {
                        chunk: chunk.clone(),
                        vector,
                        model: self.embedder.model_name().to_string(),
                    })
                })
                .collect();

            if records.is_empty() {
                continue;
            }
            self.store
                .upsert(&records)
                .await
                .map_err(|e| AssistantError::Store(e.to_string()))?;
            report.indexed += records.len();
        }

        debug!(indexed = report.indexed, failed = report.failed, "index add finished");
        Ok(report)
    }

    async fn embed_individually(&self, batch: &[Chunk], report: &mut AddReport) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(batch.len());
        for chunk in batch {
            match embed_one(self.embedder.as_ref(), &chunk.text).await {
                Ok(v) => out.push(Some(v)),
                Err(e) => {
                    warn!(chunk = %chunk.key(), error = %e, "skipping chunk that failed to embed");
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", chunk.key(), e));
                    out.push(None);
                }
            }
        }
        out
    }

    /// Top-`k` chunks by cosine similarity to `text`.
    ///
    /// An empty index returns no hits without calling the embedder.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<VectorHit>, AssistantError> {
        if k == 0 || self.is_empty().await? {
            return Ok(Vec::new());
        }

        let vector = embed_one(self.embedder.as_ref(), text)
            .await
            .map_err(|e| AssistantError::EmbeddingFailure(e.to_string()))?;

        self.store
            .query(&vector, k)
            .await
            .map_err(|e| AssistantError::Store(e.to_string()))
    }

    pub async fn len(&self) -> Result<usize, AssistantError> {
        self.store
            .len()
            .await
            .map_err(|e| AssistantError::Store(e.to_string()))
    }

    pub async fn is_empty(&self) -> Result<bool, AssistantError> {
        Ok(self.len().await? == 0)
    }
}
