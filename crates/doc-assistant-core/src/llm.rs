//! LLM capability trait.
//!
//! Backends (hosted OpenAI, local Ollama) live in the `doc-assistant` app
//! crate; the composer and the memory extractor only see [`Generator`].

use anyhow::Result;
use async_trait::async_trait;

/// Text completion from a single prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend identifier for logs (e.g. `"openai:gpt-4o-mini"`).
    fn backend_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
