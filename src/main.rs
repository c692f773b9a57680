//! # Doc Assistant CLI (`dqa`)
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./config/dqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa init` | Create the SQLite database and the memory files |
//! | `dqa ingest <paths>...` | Parse, chunk and index `.txt` / `.md` / `.pdf` files |
//! | `dqa ask "<question>"` | Answer one question with citations |
//! | `dqa chat` | Interactive session with conversation history |
//! | `dqa memory show` | Print persisted user / company memory |
//! | `dqa stats` | Index and memory overview |
//! | `dqa serve` | Start the HTTP API |
//! | `dqa sanity <docs>` | Scripted end-to-end run, written as JSON |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use doc_assistant::assistant::{Assistant, MemoryOutcome, TurnOutcome};
use doc_assistant::config::{self, Config};
use doc_assistant::ingest;
use doc_assistant::memory_file::MarkdownMemoryStore;
use doc_assistant::{migrate, sanity, server, stats};
use doc_assistant_core::memory::MemoryStore;
use doc_assistant_core::models::{Citation, Partition, Turn};

/// Doc Assistant: ask questions about your documents, with citations and
/// long-term memory.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "Doc Assistant: grounded answers with citations over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and memory files. Idempotent.
    Init,

    /// Ingest documents (files or directories).
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a single question.
    Ask {
        question: String,

        /// Print the answer, citations and memory writes as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive question/answer session. Empty line or `exit` to quit.
    Chat,

    /// Inspect long-term memory.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show index and memory statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Ingest a directory, ask scripted questions, exercise memory, and
    /// write the results as JSON.
    Sanity {
        /// Directory of sample documents.
        docs: PathBuf,

        /// Output file.
        #[arg(long, default_value = "artifacts/sanity_output.json")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print stored facts.
    Show {
        /// `user` or `organization` (default: both).
        #[arg(long)]
        partition: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            MarkdownMemoryStore::new(cfg.memory.dir.clone()).init().await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths } => {
            let assistant = Assistant::open(&cfg).await?;
            let report = assistant.ingest_paths(&paths).await?;
            ingest::print_report(&report);
        }
        Commands::Ask { question, json } => {
            let assistant = Assistant::open(&cfg).await?;
            let outcome = assistant.turn(&question, &[]).await;
            if json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
            if outcome.answer.is_err() {
                std::process::exit(1);
            }
        }
        Commands::Chat => run_chat(&cfg).await?,
        Commands::Memory {
            action: MemoryAction::Show { partition },
        } => show_memory(&cfg, partition.as_deref()).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Sanity { docs, out } => {
            let path = sanity::run_sanity(&cfg, &docs, &out).await?;
            println!("sanity output written to {}", path.display());
        }
    }

    Ok(())
}

async fn run_chat(cfg: &Config) -> Result<()> {
    let assistant = Assistant::open(cfg).await?;
    let mut history: Vec<Turn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask about your documents. Empty line or `exit` to quit.");
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question == "exit" {
            break;
        }

        let outcome = assistant.turn(question, &history).await;
        print_outcome(&outcome);
        println!();
        history.push(outcome.to_turn());
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("{}", outcome.display_text());

    if let Ok(answer) = &outcome.answer {
        if !answer.citations.is_empty() {
            println!();
            println!("Sources:");
            for (i, c) in answer.citations.iter().enumerate() {
                println!("  [{}] {} | {} (score {:.3})", i + 1, c.source, c.locator, c.score);
                println!("      {}", c.snippet);
            }
        }
    }

    print_memory_outcome(&outcome.memory);
}

fn print_memory_outcome(memory: &MemoryOutcome) {
    if !memory.written.is_empty() {
        println!();
        println!("Remembered {} fact(s):", memory.written.len());
        for entry in &memory.written {
            println!("  [{}] {}", entry.partition, entry.content);
        }
    }
    if let Some(err) = &memory.error {
        eprintln!("memory not updated: {}", err);
    }
}

#[derive(Serialize)]
struct AskJson<'a> {
    question: &'a str,
    answer: String,
    grounded: bool,
    citations: &'a [Citation],
    memory: &'a MemoryOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

fn print_json(outcome: &TurnOutcome) -> Result<()> {
    let (grounded, citations, error): (bool, &[Citation], _) = match &outcome.answer {
        Ok(answer) => (answer.grounded, &answer.citations, None),
        Err(e) => (false, &[], Some(e.code())),
    };
    let body = AskJson {
        question: &outcome.question,
        answer: outcome.display_text(),
        grounded,
        citations,
        memory: &outcome.memory,
        error,
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn show_memory(cfg: &Config, partition: Option<&str>) -> Result<()> {
    let partitions = match partition {
        None => Partition::ALL.to_vec(),
        Some(label) => vec![Partition::from_label(label)
            .ok_or_else(|| anyhow::anyhow!("Unknown partition: '{}'. Use user or organization.", label))?],
    };

    let store = MarkdownMemoryStore::new(cfg.memory.dir.clone());
    for partition in partitions {
        let entries = store.entries(partition).await?;
        println!("{} ({})", partition, store.path(partition).display());
        if entries.is_empty() {
            println!("  (none)");
        }
        for entry in entries {
            println!("  - {}", entry.content);
        }
    }
    Ok(())
}
