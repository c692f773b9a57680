//! LLM backends for answer composition and memory extraction.
//!
//! Both backends speak the OpenAI-compatible chat-completions protocol:
//! - **hosted**: OpenAI at `llm.hosted_url`, model `llm.hosted_model`, key from `OPENAI_API_KEY`.
//! - **local**: Ollama's OpenAI-compatible endpoint at `llm.local_url`, no key.
//!
//! The local backend is selected by `llm.use_local = true` or by
//! `DQA_USE_LOCAL_LLM=1`. Without a key and without the local switch the
//! [`DisabledGenerator`] is used, which turns every question into a
//! generation failure.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use doc_assistant_core::llm::Generator;

use crate::config::LlmConfig;
use crate::http::{self, JsonPost};
use crate::timeout::TimeoutGenerator;

pub struct DisabledGenerator {
    reason: String,
}

impl DisabledGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Generator for DisabledGenerator {
    fn backend_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("LLM unavailable: {}", self.reason)
    }
}

/// `POST {base_url}/chat/completions` with a single user message.
pub struct ChatCompletionGenerator {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionGenerator {
    pub fn new(
        name: &str,
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        config: &LlmConfig,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ChatCompletionGenerator {
    fn backend_name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
        });
        let json = JsonPost {
            client: &self.client,
            url: format!("{}/chat/completions", self.base_url),
            bearer: self.api_key.as_deref(),
            body: &body,
            max_retries: self.max_retries,
            service: &self.name,
        }
        .send()
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: missing choices[0].message.content"))
}

/// Build the configured [`Generator`], wrapped in a per-call timeout.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let backend = if config.use_local {
        ChatCompletionGenerator::new(
            "ollama",
            &config.local_url,
            &config.local_model,
            None,
            config,
        )?
    } else {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => ChatCompletionGenerator::new(
                "openai",
                &config.hosted_url,
                &config.hosted_model,
                Some(key),
                config,
            )?,
            _ => {
                tracing::warn!("OPENAI_API_KEY not set and local LLM not enabled; answers are unavailable");
                return Ok(Arc::new(DisabledGenerator::new(
                    "set OPENAI_API_KEY or enable the local backend",
                )));
            }
        }
    };
    tracing::info!(backend = backend.backend_name(), model = backend.model(), "LLM backend selected");

    let budget = http::retry_budget(config.timeout_secs, config.max_retries);
    Ok(Arc::new(TimeoutGenerator::new(Arc::new(backend), budget)))
}
