//! Index and memory overview for `dqa stats`.

use anyhow::Result;

use doc_assistant_core::memory::MemoryStore;
use doc_assistant_core::models::Partition;
use doc_assistant_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::memory_file::MarkdownMemoryStore;
use crate::migrate::migrate_pool;
use crate::sqlite_store::SqliteVectorStore;

/// Query the index and memory files and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let store = SqliteVectorStore::new(pool);

    let total_chunks = store.len().await?;
    let sources = store.source_counts().await?;
    let last_indexed = store.last_indexed_at().await?;

    let memory = MarkdownMemoryStore::new(config.memory.dir.clone());
    let user_facts = memory.entries(Partition::User).await?.len();
    let company_facts = memory.entries(Partition::Organization).await?.len();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Doc Assistant: Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", sources.len());
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Last ingest: {}",
        last_indexed
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();
    println!("  Memory:      {}", config.memory.dir.display());
    println!("  User facts:     {}", user_facts);
    println!("  Company facts:  {}", company_facts);

    if !sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(49));
        for (source, chunks) in &sources {
            println!("  {:<40} {:>8}", source, chunks);
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
