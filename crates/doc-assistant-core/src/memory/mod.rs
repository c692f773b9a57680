//! Long-term memory: candidate extraction and the write policy.
//!
//! Per turn, the [`MemoryExtractor`](extract::MemoryExtractor) asks the LLM
//! for durable facts and the [`MemoryWriter`](writer::MemoryWriter) decides
//! which of them to persist:
//!
//! 1. discard candidates below the confidence threshold,
//! 2. discard near-duplicates of stored or already-accepted entries,
//! 3. append the rest to the target partition's [`MemoryStore`](store::MemoryStore).

pub mod dedup;
pub mod extract;
pub mod store;
pub mod writer;

pub use dedup::{EmbeddingSimilarity, LexicalSimilarity, Similarity};
pub use extract::MemoryExtractor;
pub use store::{InMemoryMemoryStore, MemoryStore};
pub use writer::{MemoryWriter, WritePolicy};
