//! # Doc Assistant Core
//!
//! Native-free logic for Doc Assistant: data models, the paragraph-aware
//! chunker, the vector index and retriever, grounded answer composition,
//! and the memory extraction / write policy.
//!
//! Every external capability (embedding model, vector store, LLM, memory
//! persistence) is consumed through a trait defined here. This crate has no
//! tokio, sqlx, or filesystem dependencies; the `doc-assistant` app crate
//! supplies the concrete backends.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod memory;
pub mod models;
pub mod retrieve;
pub mod store;

pub use error::AssistantError;
