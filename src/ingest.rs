//! Ingestion pipeline: parse → chunk → embed → store.
//!
//! Each document is processed on its own; a parse, embedding, or store
//! failure is recorded in that document's [`DocumentReport`] and the next
//! document proceeds.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use doc_assistant_core::chunk::{chunk_document, ChunkingParams};
use doc_assistant_core::index::Index;

use crate::parse::{parse_upload, DocumentFormat};

/// Outcome for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentReport {
    pub source: String,
    pub chunks: usize,
    pub indexed: usize,
    pub failed: usize,
    /// Why the document (or some of its chunks) was not fully indexed.
    pub errors: Vec<String>,
}

impl DocumentReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents: Vec<DocumentReport>,
}

impl IngestReport {
    pub fn chunks_indexed(&self) -> usize {
        self.documents.iter().map(|d| d.indexed).sum()
    }

    pub fn failed_documents(&self) -> usize {
        self.documents.iter().filter(|d| d.indexed == 0 && !d.is_ok()).count()
    }
}

/// Parse, chunk and index one uploaded document.
pub async fn ingest_bytes(
    index: &Index,
    params: &ChunkingParams,
    filename: &str,
    bytes: &[u8],
) -> DocumentReport {
    let mut report = DocumentReport {
        source: filename.to_string(),
        ..DocumentReport::default()
    };

    let doc = match parse_upload(filename, bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(source = filename, error = %e, "skipping document");
            report.errors.push(e.to_string());
            return report;
        }
    };

    let chunks = chunk_document(&doc, params);
    report.chunks = chunks.len();

    match index.add(&chunks).await {
        Ok(added) => {
            report.indexed = added.indexed;
            report.failed = added.failed;
            report.errors.extend(added.errors);
        }
        Err(e) => {
            warn!(source = filename, error = %e, "failed to store document");
            report.failed = chunks.len();
            report.errors.push(e.to_string());
        }
    }

    info!(
        source = filename,
        chunks = report.chunks,
        indexed = report.indexed,
        failed = report.failed,
        "ingested document"
    );
    report
}

/// Supported files under `path` (or `path` itself), sorted, with the
/// source name each one is indexed under.
pub fn collect_files(path: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        return Ok(vec![(path.to_path_buf(), name)]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if DocumentFormat::from_filename(&name).is_none() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push((entry.path().to_path_buf(), relative));
    }
    Ok(files)
}

/// Ingest every supported file under each of `paths`.
pub async fn ingest_paths(
    index: &Index,
    params: &ChunkingParams,
    paths: &[PathBuf],
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for root in paths {
        for (file, source) in collect_files(root)? {
            let doc_report = match tokio::fs::read(&file).await {
                Ok(bytes) => ingest_bytes(index, params, &source, &bytes).await,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "failed to read file");
                    DocumentReport {
                        source,
                        errors: vec![format!("failed to read {}: {}", file.display(), e)],
                        ..DocumentReport::default()
                    }
                }
            };
            report.documents.push(doc_report);
        }
    }

    Ok(report)
}

pub fn print_report(report: &IngestReport) {
    println!("ingest");
    for doc in &report.documents {
        if doc.is_ok() {
            println!("  {}: {} chunks indexed", doc.source, doc.indexed);
        } else if doc.chunks == 0 {
            println!("  {}: FAILED ({})", doc.source, doc.errors.join("; "));
        } else {
            println!(
                "  {}: {}/{} chunks indexed ({} failed)",
                doc.source, doc.indexed, doc.chunks, doc.failed
            );
            for err in &doc.errors {
                println!("    - {}", err);
            }
        }
    }
    println!("  documents: {}", report.documents.len());
    println!("  chunks indexed: {}", report.chunks_indexed());
    if report.failed_documents() > 0 {
        println!("  failed documents: {}", report.failed_documents());
    }
    println!("ok");
}
