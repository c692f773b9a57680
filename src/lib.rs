//! # Doc Assistant
//!
//! A document-grounded question-answering assistant: documents are parsed,
//! chunked and embedded into a SQLite vector index; questions are answered
//! by an LLM constrained to the retrieved passages, with inline citations;
//! durable facts about the user and organization are extracted from each
//! turn and kept in two markdown memory files.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload     │──▶│ Parse+Chunk  │──▶│  SQLite   │
//! │ txt/md/pdf  │   │   +Embed     │   │  vectors  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │ retrieve
//!                   ┌──────────────┐   ┌────▼─────┐
//!   question ──────▶│   Memory     │   │ Composer │──▶ answer + citations
//!                   │ extract+write│   │  (LLM)   │
//!                   └──────┬───────┘   └──────────┘
//!                          ▼
//!            USER_MEMORY.md / COMPANY_MEMORY.md
//! ```
//!
//! The pipeline logic (chunker, index, retriever, composer, memory policy)
//! lives in `doc-assistant-core`; this crate supplies the backends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat-completion backends |
//! | [`parse`] | txt / md / pdf text extraction |
//! | [`ingest`] | Ingestion pipeline |
//! | [`memory_file`] | Markdown memory files |
//! | [`assistant`] | Per-turn orchestration |
//! | [`stats`] | `dqa stats` |
//! | [`sanity`] | `dqa sanity` scripted run |
//! | [`server`] | HTTP API |

pub mod assistant;
pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod memory_file;
pub mod migrate;
pub mod parse;
pub mod sanity;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod timeout;
