//! Memory persistence trait and an in-memory implementation.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MemoryEntry, Partition};

/// Append-only storage for memory entries, one logical list per partition.
///
/// Entries are never mutated or removed once appended.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// All entries in `partition`, oldest first.
    async fn entries(&self, partition: Partition) -> Result<Vec<MemoryEntry>>;

    async fn append(&self, entry: &MemoryEntry) -> Result<()>;

    /// Entry contents across every partition, for prompt context.
    async fn all_facts(&self) -> Result<Vec<String>> {
        let mut facts = Vec::new();
        for partition in Partition::ALL {
            facts.extend(self.entries(partition).await?.into_iter().map(|e| e.content));
        }
        Ok(facts)
    }
}

#[derive(Default)]
pub struct InMemoryMemoryStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn entries(&self, partition: Partition) -> Result<Vec<MemoryEntry>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.partition == partition)
            .cloned()
            .collect())
    }

    async fn append(&self, entry: &MemoryEntry) -> Result<()> {
        self.entries.write().unwrap().push(entry.clone());
        Ok(())
    }
}
