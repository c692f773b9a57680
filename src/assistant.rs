//! Turn orchestration.
//!
//! An [`Assistant`] owns the index, the answer composer and the memory
//! pipeline. Each call to [`Assistant::turn`]:
//!
//! 1. loads persisted memory facts into the conversation context,
//! 2. spawns memory extraction + writing for the user's message,
//! 3. retrieves and composes the grounded answer,
//! 4. awaits the memory task.
//!
//! The answer and the memory outcome are reported separately: a memory
//! failure never fails the answer, and a fallback answer still lets the
//! memory pipeline run.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use doc_assistant_core::answer::{Answer, AnswerComposer};
use doc_assistant_core::chunk::ChunkingParams;
use doc_assistant_core::embedding::Embedder;
use doc_assistant_core::index::Index;
use doc_assistant_core::llm::Generator;
use doc_assistant_core::memory::{
    EmbeddingSimilarity, LexicalSimilarity, MemoryExtractor, MemoryStore, MemoryWriter, Similarity,
    WritePolicy,
};
use doc_assistant_core::models::{ConversationContext, MemoryEntry, Turn};
use doc_assistant_core::retrieve::{RetrievalParams, Retriever};
use doc_assistant_core::store::VectorStore;
use doc_assistant_core::AssistantError;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::ingest::{self, DocumentReport, IngestReport};
use crate::llm::create_generator;
use crate::memory_file::MarkdownMemoryStore;
use crate::migrate::migrate_pool;
use crate::sqlite_store::SqliteVectorStore;

/// Shown instead of the raw error when answer generation fails.
pub const UNAVAILABLE_MESSAGE: &str = "Sorry, the assistant is unavailable right now. Please try again.";

/// Everything an [`Assistant`] is assembled from.
pub struct Components {
    pub embedder: Arc<dyn Embedder>,
    pub vectors: Arc<dyn VectorStore>,
    pub generator: Arc<dyn Generator>,
    pub memory: Arc<dyn MemoryStore>,
    pub similarity: Arc<dyn Similarity>,
    pub chunking: ChunkingParams,
    pub retrieval: RetrievalParams,
    pub policy: WritePolicy,
    pub batch_size: usize,
    /// When false, turns skip memory extraction entirely.
    pub memory_enabled: bool,
}

#[derive(Clone)]
pub struct Assistant {
    index: Index,
    composer: AnswerComposer,
    extractor: MemoryExtractor,
    writer: MemoryWriter,
    memory: Arc<dyn MemoryStore>,
    chunking: ChunkingParams,
    memory_enabled: bool,
}

/// What the memory pipeline did during one turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryOutcome {
    /// Candidates proposed by the extractor.
    pub proposed: usize,
    /// Entries actually persisted.
    pub written: Vec<MemoryEntry>,
    /// Extraction or write failure, if any.
    pub error: Option<String>,
}

/// Result of one conversational turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub question: String,
    pub answer: Result<Answer, AssistantError>,
    pub memory: MemoryOutcome,
}

impl TurnOutcome {
    /// Text to show the user: the answer, or a generic apology when
    /// generation failed.
    pub fn display_text(&self) -> String {
        match &self.answer {
            Ok(answer) => answer.text.clone(),
            Err(AssistantError::GenerationFailure(_)) => UNAVAILABLE_MESSAGE.to_string(),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// The completed exchange, for conversation history.
    pub fn to_turn(&self) -> Turn {
        Turn::new(self.question.clone(), self.display_text())
    }
}

impl Assistant {
    pub fn new(parts: Components) -> Self {
        let index = Index::new(parts.embedder, parts.vectors, parts.batch_size);
        let retriever = Retriever::new(index.clone(), parts.retrieval);
        let composer = AnswerComposer::new(retriever, parts.generator.clone());
        let extractor = MemoryExtractor::new(parts.generator);
        let writer = MemoryWriter::new(parts.memory.clone(), parts.similarity, parts.policy);

        Self {
            index,
            composer,
            extractor,
            writer,
            memory: parts.memory,
            chunking: parts.chunking,
            memory_enabled: parts.memory_enabled,
        }
    }

    /// Build from configuration: SQLite vector store (migrated), configured
    /// embedder and LLM, markdown memory files.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate_pool(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.llm)?;
        let memory: Arc<dyn MemoryStore> = Arc::new(MarkdownMemoryStore::new(config.memory.dir.clone()));
        let similarity: Arc<dyn Similarity> = match config.memory.dedup.as_str() {
            "embedding" => Arc::new(EmbeddingSimilarity::new(embedder.clone())),
            _ => Arc::new(LexicalSimilarity),
        };

        Ok(Self::new(Components {
            embedder,
            vectors: Arc::new(SqliteVectorStore::new(pool)),
            generator,
            memory,
            similarity,
            chunking: config.chunking.params(),
            retrieval: config.retrieval.params(),
            policy: config.memory.policy(),
            batch_size: config.embedding.batch_size,
            memory_enabled: config.memory.enabled,
        }))
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub async fn ingest_bytes(&self, filename: &str, bytes: &[u8]) -> DocumentReport {
        ingest::ingest_bytes(&self.index, &self.chunking, filename, bytes).await
    }

    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        ingest::ingest_paths(&self.index, &self.chunking, paths).await
    }

    /// Answer `question` given the earlier turns, and run the memory
    /// pipeline on the user's message.
    pub async fn turn(&self, question: &str, history: &[Turn]) -> TurnOutcome {
        let known_facts = match self.memory.all_facts().await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(error = %e, "failed to load memory, continuing without it");
                Vec::new()
            }
        };
        let context = ConversationContext {
            history: history.to_vec(),
            known_facts,
        };

        let memory_task = if self.memory_enabled {
            let extractor = self.extractor.clone();
            let writer = self.writer.clone();
            let turn_text = format!("User: {}", question);
            let context = context.clone();
            Some(tokio::spawn(async move {
                remember(&extractor, &writer, &turn_text, &context).await
            }))
        } else {
            None
        };

        let answer = self.composer.answer(question, &context).await;
        if let Err(e) = &answer {
            warn!(code = e.code(), error = %e, "turn failed to produce an answer");
        }

        let memory = match memory_task {
            Some(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => MemoryOutcome {
                    error: Some(format!("memory task panicked: {}", e)),
                    ..MemoryOutcome::default()
                },
            },
            None => MemoryOutcome::default(),
        };

        TurnOutcome {
            question: question.to_string(),
            answer,
            memory,
        }
    }
}

async fn remember(
    extractor: &MemoryExtractor,
    writer: &MemoryWriter,
    turn_text: &str,
    context: &ConversationContext,
) -> MemoryOutcome {
    let candidates = match extractor.extract(turn_text, context).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "memory extraction failed");
            return MemoryOutcome {
                error: Some(e.to_string()),
                ..MemoryOutcome::default()
            };
        }
    };

    let proposed = candidates.len();
    match writer.write(&candidates).await {
        Ok(written) => {
            debug!(proposed, written = written.len(), "memory pipeline finished");
            MemoryOutcome {
                proposed,
                written,
                error: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "memory write failed");
            MemoryOutcome {
                proposed,
                written: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Deterministic embedder and LLM for turn-level tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use doc_assistant_core::memory::InMemoryMemoryStore;
    use doc_assistant_core::store::memory::InMemoryVectorStore;
    use std::sync::Mutex;

    /// `[1, 0]` for text mentioning invoices, `[0, 1]` otherwise.
    pub(crate) struct OneHot;

    #[async_trait]
    impl Embedder for OneHot {
        fn model_name(&self) -> &str {
            "one-hot"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("invoice") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    /// Answers with `answer` unless the prompt is the memory prompt.
    pub(crate) struct Router {
        pub(crate) answer: Option<String>,
        pub(crate) memory: String,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for Router {
        fn backend_name(&self) -> &str {
            "router"
        }
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains("Respond with a JSON array") {
                return Ok(self.memory.clone());
            }
            match &self.answer {
                Some(a) => Ok(a.clone()),
                None => anyhow::bail!("backend down"),
            }
        }
    }

    /// In-memory assistant whose LLM replies `answer` (or fails when `None`)
    /// and extracts `memory_json`.
    pub(crate) fn scripted_assistant(
        answer: Option<&str>,
        memory_json: &str,
    ) -> (Assistant, Arc<InMemoryMemoryStore>, Arc<Router>) {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let generator = Arc::new(Router {
            answer: answer.map(str::to_string),
            memory: memory_json.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let assistant = Assistant::new(Components {
            embedder: Arc::new(OneHot),
            vectors: Arc::new(InMemoryVectorStore::new()),
            generator: generator.clone(),
            memory: memory.clone(),
            similarity: Arc::new(LexicalSimilarity),
            chunking: ChunkingParams::default(),
            retrieval: RetrievalParams::default(),
            policy: WritePolicy::default(),
            batch_size: 8,
            memory_enabled: true,
        });
        (assistant, memory, generator)
    }
}
