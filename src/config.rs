use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use doc_assistant_core::chunk::ChunkingParams;
use doc_assistant_core::memory::WritePolicy;
use doc_assistant_core::retrieve::RetrievalParams;

/// Environment variable that forces the local LLM backend when set to `1`.
pub const USE_LOCAL_LLM_ENV: &str = "DQA_USE_LOCAL_LLM";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
        }
    }
}

fn default_max_tokens() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            max_tokens: self.max_tokens,
            overlap_tokens: self.overlap_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Cosine floor for a hit to count as relevant. Tuned for the default
    /// `all-minilm-l6-v2` model.
    #[serde(default = "default_min_score")]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    200
}
fn default_min_score() -> Option<f32> {
    Some(0.25)
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            snippet_chars: self.snippet_chars,
            min_score: self.min_score,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Use the local Ollama backend instead of hosted OpenAI.
    #[serde(default)]
    pub use_local: bool,
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_hosted_url")]
    pub hosted_url: String,
    #[serde(default = "default_hosted_model")]
    pub hosted_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            use_local: false,
            local_url: default_local_url(),
            local_model: default_local_model(),
            hosted_url: default_hosted_url(),
            hosted_model: default_hosted_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_local_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_local_model() -> String {
    "llama3.2".to_string()
}
fn default_hosted_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_hosted_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory holding `USER_MEMORY.md` and `COMPANY_MEMORY.md`.
    #[serde(default = "default_memory_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,
    /// `lexical` or `embedding`.
    #[serde(default = "default_dedup")]
    pub dedup: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_memory_dir(),
            confidence_threshold: default_confidence_threshold(),
            dedup_threshold: default_dedup_threshold(),
            dedup: default_dedup(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_memory_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_confidence_threshold() -> f32 {
    0.8
}
fn default_dedup_threshold() -> f32 {
    0.7
}
fn default_dedup() -> String {
    "lexical".to_string()
}

impl MemoryConfig {
    pub fn policy(&self) -> WritePolicy {
        WritePolicy {
            confidence_threshold: self.confidence_threshold,
            dedup_threshold: self.dedup_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Defaults everywhere, with the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/dqa.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(value) = std::env::var(USE_LOCAL_LLM_ENV) {
        config.llm.use_local = matches!(value.trim(), "1" | "true" | "yes");
    }
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_tokens < 2 {
        anyhow::bail!("chunking.max_tokens must be >= 2");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.snippet_chars < 1 {
        anyhow::bail!("retrieval.snippet_chars must be >= 1");
    }
    if let Some(min) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&min) {
            anyhow::bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }

    // Validate llm
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    // Validate memory
    if !(0.0..=1.0).contains(&config.memory.confidence_threshold) {
        anyhow::bail!("memory.confidence_threshold must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.memory.dedup_threshold) {
        anyhow::bail!("memory.dedup_threshold must be in [0.0, 1.0]");
    }
    match config.memory.dedup.as_str() {
        "lexical" => {}
        "embedding" => {
            if !config.embedding.is_enabled() {
                anyhow::bail!("memory.dedup = \"embedding\" requires an embedding provider");
            }
        }
        other => anyhow::bail!(
            "Unknown memory.dedup: '{}'. Must be lexical or embedding.",
            other
        ),
    }

    Ok(())
}
