//! The memory write policy: confidence gate, dedup, append.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AssistantError;
use crate::models::{MemoryCandidate, MemoryEntry, Partition};

use super::dedup::{lexical_similarity, Similarity};
use super::store::MemoryStore;

/// Thresholds applied by [`MemoryWriter::write`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritePolicy {
    /// Candidates below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Candidates at least this similar to a known entry are duplicates.
    pub dedup_threshold: f32,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            dedup_threshold: 0.7,
        }
    }
}

/// Clones share one write lock: concurrent [`MemoryWriter::write`] calls
/// run one at a time, so the duplicate check and the append of a call see
/// every entry appended by the calls before it.
#[derive(Clone)]
pub struct MemoryWriter {
    store: Arc<dyn MemoryStore>,
    similarity: Arc<dyn Similarity>,
    policy: WritePolicy,
    write_lock: Arc<Mutex<()>>,
}

impl MemoryWriter {
    pub fn new(store: Arc<dyn MemoryStore>, similarity: Arc<dyn Similarity>, policy: WritePolicy) -> Self {
        Self {
            store,
            similarity,
            policy,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Persist the candidates that pass the policy, in order, and return them.
    ///
    /// A store failure stops the batch; entries appended before it stay.
    pub async fn write(&self, candidates: &[MemoryCandidate]) -> Result<Vec<MemoryEntry>, AssistantError> {
        let _guard = self.write_lock.lock().await;
        let mut known: HashMap<Partition, Vec<String>> = HashMap::new();
        let mut accepted = Vec::new();

        for candidate in candidates {
            // NaN fails this comparison too.
            if !(candidate.confidence >= self.policy.confidence_threshold) {
                debug!(
                    confidence = candidate.confidence,
                    "discarding low-confidence memory candidate"
                );
                continue;
            }

            let content = single_line(&candidate.content);
            if content.is_empty() {
                continue;
            }

            let partition = candidate.target_partition;
            if !known.contains_key(&partition) {
                let existing = self
                    .store
                    .entries(partition)
                    .await
                    .map_err(|e| AssistantError::MemoryWriteFailure(e.to_string()))?;
                known.insert(partition, existing.into_iter().map(|e| e.content).collect());
            }
            let entries = known.entry(partition).or_default();

            if let Some(duplicate) = self.find_duplicate(&content, entries).await {
                debug!(%partition, candidate = %content, existing = %duplicate, "skipping duplicate memory");
                continue;
            }

            let entry = MemoryEntry {
                content: content.clone(),
                partition,
            };
            self.store
                .append(&entry)
                .await
                .map_err(|e| AssistantError::MemoryWriteFailure(e.to_string()))?;
            info!(%partition, content = %entry.content, "stored memory");
            entries.push(content);
            accepted.push(entry);
        }

        Ok(accepted)
    }

    async fn find_duplicate(&self, content: &str, existing: &[String]) -> Option<String> {
        for other in existing {
            let score = match self.similarity.similarity(content, other).await {
                Ok(score) => score,
                Err(e) => {
                    warn!(
                        similarity = self.similarity.name(),
                        error = %e,
                        "similarity check failed, falling back to lexical"
                    );
                    lexical_similarity(content, other)
                }
            };
            if score >= self.policy.dedup_threshold {
                return Some(other.clone());
            }
        }
        None
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
