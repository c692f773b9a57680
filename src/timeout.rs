//! Deadline wrappers for the external capabilities.
//!
//! A call that exceeds its deadline fails like any other backend error, so
//! the index reports an embedding failure and the composer a generation
//! failure.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use doc_assistant_core::embedding::Embedder;
use doc_assistant_core::llm::Generator;

pub struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    limit: Duration,
}

impl TimeoutEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Embedder for TimeoutEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match tokio::time::timeout(self.limit, self.inner.embed(texts)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("embedding timed out after {:?}", self.limit),
        }
    }
}

pub struct TimeoutGenerator {
    inner: Arc<dyn Generator>,
    limit: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn Generator>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Generator for TimeoutGenerator {
    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.limit, self.inner.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("generation timed out after {:?}", self.limit),
        }
    }
}
