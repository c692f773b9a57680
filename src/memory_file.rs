//! Markdown-file [`MemoryStore`]: `USER_MEMORY.md` and `COMPANY_MEMORY.md`.
//!
//! Each file starts with a `# ... MEMORY` header and an HTML comment of
//! guidance; every fact is one `- ` bullet line. Lines that are not bullets
//! are ignored on read, so the files can be edited by hand.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use doc_assistant_core::memory::MemoryStore;
use doc_assistant_core::models::{MemoryEntry, Partition};

pub const USER_MEMORY_FILE: &str = "USER_MEMORY.md";
pub const COMPANY_MEMORY_FILE: &str = "COMPANY_MEMORY.md";

const USER_TEMPLATE: &str = "# USER MEMORY\n\n<!--\nAppend only high-signal, user-specific facts worth remembering.\nDo NOT dump raw conversation.\nAvoid secrets or sensitive information.\n-->\n\n";
const COMPANY_TEMPLATE: &str = "# COMPANY MEMORY\n\n<!--\nAppend reusable org-wide learnings that could help colleagues too.\nDo NOT dump raw conversation.\nAvoid secrets or sensitive information.\n-->\n\n";

pub struct MarkdownMemoryStore {
    dir: PathBuf,
    user_lock: Mutex<()>,
    company_lock: Mutex<()>,
}

impl MarkdownMemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            user_lock: Mutex::new(()),
            company_lock: Mutex::new(()),
        }
    }

    pub fn path(&self, partition: Partition) -> PathBuf {
        self.dir.join(file_name(partition))
    }

    /// Create both files with their templates if they are missing.
    pub async fn init(&self) -> Result<()> {
        for partition in Partition::ALL {
            let _guard = self.lock(partition).lock().await;
            ensure_file(&self.path(partition), partition).await?;
        }
        Ok(())
    }

    fn lock(&self, partition: Partition) -> &Mutex<()> {
        match partition {
            Partition::User => &self.user_lock,
            Partition::Organization => &self.company_lock,
        }
    }
}

fn file_name(partition: Partition) -> &'static str {
    match partition {
        Partition::User => USER_MEMORY_FILE,
        Partition::Organization => COMPANY_MEMORY_FILE,
    }
}

fn template(partition: Partition) -> &'static str {
    match partition {
        Partition::User => USER_TEMPLATE,
        Partition::Organization => COMPANY_TEMPLATE,
    }
}

async fn ensure_file(path: &Path, partition: Partition) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, template(partition))
        .await
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// Bullet lines (`- fact` or `* fact`) outside HTML comments, in file order.
fn parse_bullets(content: &str) -> Vec<String> {
    let mut facts = Vec::new();
    let mut in_comment = false;

    for line in content.lines().map(str::trim) {
        if in_comment {
            in_comment = !line.contains("-->");
            continue;
        }
        if line.starts_with("<!--") {
            in_comment = !line.contains("-->");
            continue;
        }
        if let Some(fact) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            let fact = fact.trim();
            if !fact.is_empty() {
                facts.push(fact.to_string());
            }
        }
    }

    facts
}

#[async_trait]
impl MemoryStore for MarkdownMemoryStore {
    async fn entries(&self, partition: Partition) -> Result<Vec<MemoryEntry>> {
        let path = self.path(partition);
        let _guard = self.lock(partition).lock().await;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        Ok(parse_bullets(&content)
            .into_iter()
            .map(|content| MemoryEntry { content, partition })
            .collect())
    }

    async fn append(&self, entry: &MemoryEntry) -> Result<()> {
        let path = self.path(entry.partition);
        let _guard = self.lock(entry.partition).lock().await;
        ensure_file(&path, entry.partition).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let line = format!("- {}\n", entry.content);
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
