//! End-to-end pipeline tests over the durable backends (SQLite vectors,
//! markdown memory) with deterministic embedder and LLM fakes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use doc_assistant::assistant::{Assistant, Components};
use doc_assistant::config::Config;
use doc_assistant::db;
use doc_assistant::memory_file::{MarkdownMemoryStore, USER_MEMORY_FILE};
use doc_assistant::migrate::migrate_pool;
use doc_assistant::sqlite_store::SqliteVectorStore;
use doc_assistant_core::answer::NO_ANSWER;
use doc_assistant_core::chunk::ChunkingParams;
use doc_assistant_core::embedding::Embedder;
use doc_assistant_core::llm::Generator;
use doc_assistant_core::memory::{LexicalSimilarity, MemoryStore, WritePolicy};
use doc_assistant_core::models::Partition;
use doc_assistant_core::retrieve::RetrievalParams;
use doc_assistant_core::store::VectorStore;

/// Bag-of-words over a fixed vocabulary.
struct VocabEmbedder {
    vocab: HashMap<String, usize>,
}

impl VocabEmbedder {
    fn new(words: &[&str]) -> Self {
        Self {
            vocab: words.iter().enumerate().map(|(i, w)| (w.to_string(), i)).collect(),
        }
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }
    fn dims(&self) -> usize {
        self.vocab.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; self.vocab.len()];
                for word in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    if let Some(&i) = self.vocab.get(word) {
                        v[i] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

/// Returns the memory reply for extraction prompts and the answer reply
/// otherwise; records every prompt.
struct FakeLlm {
    answer: String,
    memory: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn new(answer: &str, memory: &str) -> Self {
        Self {
            answer: answer.to_string(),
            memory: memory.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn answer_calls(&self) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains("Context passages:"))
            .count()
    }
}

#[async_trait]
impl Generator for FakeLlm {
    fn backend_name(&self) -> &str {
        "fake"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Respond with a JSON array") {
            Ok(self.memory.clone())
        } else {
            Ok(self.answer.clone())
        }
    }
}

const VOCAB: &[&str] = &["invoice", "approval", "finance", "travel", "hotel", "budget"];

async fn open(
    root: &Path,
    llm: Arc<FakeLlm>,
    retrieval: RetrievalParams,
) -> (Assistant, Arc<SqliteVectorStore>) {
    let pool = db::connect_path(&root.join("data/dqa.sqlite")).await.unwrap();
    migrate_pool(&pool).await.unwrap();
    let vectors = Arc::new(SqliteVectorStore::new(pool));

    let assistant = Assistant::new(Components {
        embedder: Arc::new(VocabEmbedder::new(VOCAB)),
        vectors: vectors.clone(),
        generator: llm,
        memory: Arc::new(MarkdownMemoryStore::new(root.join("memory"))),
        similarity: Arc::new(LexicalSimilarity),
        chunking: ChunkingParams::default(),
        retrieval,
        policy: WritePolicy::default(),
        batch_size: 16,
        memory_enabled: true,
    });
    (assistant, vectors)
}

fn words(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn test_three_paragraph_document_indexes_three_overlapping_chunks() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::new("unused", "[]"));
    let (assistant, vectors) = open(tmp.path(), llm, RetrievalParams::default()).await;

    let text = format!("{}\n\n{}\n\n{}", words("a", 400), words("b", 400), words("c", 400));
    let report = assistant.ingest_bytes("handbook.txt", text.as_bytes()).await;
    assert!(report.is_ok(), "{:?}", report.errors);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.indexed, 3);
    assert_eq!(
        vectors.source_counts().await.unwrap(),
        vec![("handbook.txt".to_string(), 3)]
    );

    // All-zero query vector scores every chunk 0.0; ties come back in chunk order.
    let hits = vectors.query(&vec![0.0; VOCAB.len()], 3).await.unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.chunk.chunk_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(hits[1].chunk.text.starts_with("a350 "));
    assert!(hits[2].chunk.text.starts_with(&hits[1].chunk.overlap_text));
    assert_eq!(hits[1].chunk.overlap_text.split_whitespace().count(), 50);
    assert!(hits[2].chunk.overlap_text.is_empty());
}

#[tokio::test]
async fn test_grounded_answer_cites_best_chunks_first() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::new(
        "Finance approves invoices. [Source: finance.md, Locator: Invoice Approval (chunk 0)]",
        "[]",
    ));
    let (assistant, _) = open(tmp.path(), llm.clone(), RetrievalParams::default()).await;

    assistant
        .ingest_bytes(
            "finance.md",
            b"# Invoice Approval\n\nEvery invoice needs finance approval before payment.",
        )
        .await;
    assistant
        .ingest_bytes("travel.txt", b"Travel policy: book the hotel through the portal.")
        .await;

    let outcome = assistant.turn("Who handles invoice approval?", &[]).await;
    let answer = outcome.answer.unwrap();
    assert!(answer.grounded);
    assert!(answer.text.contains("[Source: finance.md"));
    assert!(answer.citations.len() <= 5);
    assert_eq!(answer.citations[0].source, "finance.md");
    assert_eq!(answer.citations[0].locator, "Invoice Approval (chunk 0)");
    for pair in answer.citations.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(llm.answer_calls(), 1);
}

#[tokio::test]
async fn test_unrelated_question_falls_back_under_default_config() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::new(
        "Use the portal. [Source: travel.txt, Locator: travel.txt (chunk 0)]",
        "[]",
    ));
    let retrieval = Config::minimal().retrieval.params();
    assert!(retrieval.min_score.is_some());
    let (assistant, _) = open(tmp.path(), llm.clone(), retrieval).await;
    assistant
        .ingest_bytes("travel.txt", b"Book the hotel through the travel portal.")
        .await;

    let outcome = assistant.turn("What is the capital of Mongolia?", &[]).await;
    let answer = outcome.answer.unwrap();
    assert_eq!(answer.text, NO_ANSWER);
    assert!(answer.citations.is_empty());
    assert!(!answer.grounded);
    assert_eq!(llm.answer_calls(), 0);

    let outcome = assistant.turn("Which hotel budget applies?", &[]).await;
    let answer = outcome.answer.unwrap();
    assert!(answer.grounded);
    assert_eq!(answer.citations[0].source, "travel.txt");
    assert_eq!(llm.answer_calls(), 1);
}

#[tokio::test]
async fn test_preference_persisted_once() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::new(
        "unused",
        "```json\n[{\"target\": \"USER\", \"summary\": \"User prefers weekly summaries on Mondays.\", \"confidence\": 0.9}]\n```",
    ));
    let (assistant, _) = open(tmp.path(), llm, RetrievalParams::default()).await;

    let first = assistant.turn("I prefer weekly summaries on Mondays", &[]).await;
    assert_eq!(first.memory.proposed, 1);
    assert_eq!(first.memory.written.len(), 1);
    assert_eq!(first.memory.written[0].partition, Partition::User);

    let second = assistant
        .turn("I prefer weekly summaries on Mondays", &[first.to_turn()])
        .await;
    assert_eq!(second.memory.proposed, 1);
    assert!(second.memory.written.is_empty());

    let file = std::fs::read_to_string(tmp.path().join("memory").join(USER_MEMORY_FILE)).unwrap();
    assert_eq!(file.matches("weekly summaries").count(), 1);
    assert!(file.starts_with("# USER MEMORY"));
    assert!(assistant
        .memory()
        .entries(Partition::Organization)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_low_confidence_candidate_not_persisted() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::new(
        "unused",
        r#"[{"target": "COMPANY", "summary": "Team might use Jira", "confidence": 0.5}]"#,
    ));
    let (assistant, _) = open(tmp.path(), llm, RetrievalParams::default()).await;

    let outcome = assistant.turn("We might be using Jira, not sure", &[]).await;
    assert_eq!(outcome.memory.proposed, 1);
    assert!(outcome.memory.written.is_empty());
    assert!(assistant.memory().all_facts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_index_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let query = vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0];

    let before = {
        let llm = Arc::new(FakeLlm::new("unused", "[]"));
        let (assistant, vectors) = open(tmp.path(), llm, RetrievalParams::default()).await;
        assistant
            .ingest_bytes("finance.md", b"Invoice approval sits with finance.")
            .await;
        assistant
            .ingest_bytes("travel.txt", b"Hotel budget is capped per night.")
            .await;
        let hits = vectors.query(&query, 5).await.unwrap();
        vectors.pool().close().await;
        hits
    };

    let llm = Arc::new(FakeLlm::new("unused", "[]"));
    let (_assistant, vectors) = open(tmp.path(), llm, RetrievalParams::default()).await;
    assert_eq!(vectors.len().await.unwrap(), 2);
    let after = vectors.query(&query, 5).await.unwrap();

    let keys = |hits: &[doc_assistant_core::store::VectorHit]| {
        hits.iter()
            .map(|h| (h.chunk.key(), h.chunk.text.clone(), h.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&before), keys(&after));
}
