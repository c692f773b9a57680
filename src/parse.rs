//! Document text extraction for `.txt`, `.md` and `.pdf` uploads.
//!
//! Returns UTF-8 text plus a [`SectionMap`] of detected headings. A heading
//! is the first line of a paragraph that starts with `#` or ends with `:`.
//! A file that cannot be decoded, or yields no text at all, is a
//! [`AssistantError::ParseFailure`] for that file only.

use std::path::Path;

use doc_assistant_core::models::{ParsedDocument, Section, SectionMap};
use doc_assistant_core::AssistantError;

/// Headings longer than this are cut for display in locators.
const MAX_HEADING_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentFormat::PlainText),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "txt",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

/// Parse a file by name, detecting the format from its extension.
pub fn parse_upload(filename: &str, bytes: &[u8]) -> Result<ParsedDocument, AssistantError> {
    let format = DocumentFormat::from_filename(filename).ok_or_else(|| {
        AssistantError::parse(filename, "unsupported file type (expected .txt, .md or .pdf)")
    })?;
    parse_document(filename, bytes, format)
}

pub fn parse_document(
    filename: &str,
    bytes: &[u8],
    format: DocumentFormat,
) -> Result<ParsedDocument, AssistantError> {
    let text = match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => std::str::from_utf8(bytes)
            .map_err(|e| AssistantError::parse(filename, format!("invalid UTF-8: {}", e)))?
            .to_string(),
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AssistantError::parse(filename, format!("PDF extraction failed: {}", e)))?,
    };

    if text.trim().is_empty() {
        return Err(AssistantError::parse(filename, "no extractable text"));
    }

    let sections = detect_sections(&text);
    Ok(ParsedDocument {
        source: filename.to_string(),
        format: format.tag().to_string(),
        text,
        sections,
    })
}

/// Find paragraph-leading heading lines and their byte offsets.
pub fn detect_sections(text: &str) -> SectionMap {
    let mut sections = Vec::new();
    let mut offset = 0;
    let mut at_paragraph_start = true;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            at_paragraph_start = true;
        } else {
            if at_paragraph_start && (trimmed.starts_with('#') || trimmed.ends_with(':')) {
                let heading = clean_heading(trimmed);
                if !heading.is_empty() {
                    sections.push(Section { offset, heading });
                }
            }
            at_paragraph_start = false;
        }
        offset += line.len();
    }

    SectionMap::new(sections)
}

fn clean_heading(line: &str) -> String {
    let stripped = line.trim_start_matches('#').trim_end_matches(':').trim();
    stripped.chars().take(MAX_HEADING_CHARS).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    /// A single-page PDF showing `phrase` in Helvetica.
    pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >> stream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", objects.len() + 1).as_bytes(),
        );
        out.extend_from_slice(format!("{}\n%%EOF\n", xref_start).as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_filename("a.TXT"), Some(DocumentFormat::PlainText));
        assert_eq!(DocumentFormat::from_filename("notes.md"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_filename("report.pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_filename("sheet.xlsx"), None);
        assert_eq!(DocumentFormat::from_filename("README"), None);
    }

    #[test]
    fn test_markdown_headings() {
        let text = "# Overview\nThe plan.\n\nBudget:\nTwo lines\nstill budget\n\nplain paragraph\nwith colon:\n";
        let doc = parse_document("plan.md", text.as_bytes(), DocumentFormat::Markdown).unwrap();
        assert_eq!(doc.format, "md");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections.heading_at(0), Some("Overview"));
        let budget = text.find("Budget:").unwrap();
        assert_eq!(doc.sections.heading_at(budget), Some("Budget"));
        // "with colon:" is not the first line of its paragraph.
        assert_eq!(doc.sections.heading_at(text.len() - 1), Some("Budget"));
    }

    #[test]
    fn test_long_heading_truncated() {
        let line = format!("# {}", "x".repeat(200));
        let sections = detect_sections(&line);
        assert_eq!(sections.heading_at(0).map(|h| h.chars().count()), Some(80));
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let err = parse_document("bad.txt", &[0xff, 0xfe, 0x00], DocumentFormat::PlainText).unwrap_err();
        assert!(matches!(err, AssistantError::ParseFailure { .. }));
        assert!(err.to_string().contains("bad.txt"));
    }

    #[test]
    fn test_blank_text_is_parse_failure() {
        let err = parse_document("empty.txt", b"  \n\n ", DocumentFormat::PlainText).unwrap_err();
        assert!(err.to_string().contains("no extractable text"));
    }

    #[test]
    fn test_unsupported_upload() {
        let err = parse_upload("deck.pptx", b"whatever").unwrap_err();
        assert_eq!(err.code(), "parse_failure");
    }

    #[test]
    fn test_pdf_text() {
        let bytes = test_support::minimal_pdf_with_phrase("quarterly revenue grew");
        let doc = parse_upload("q3.pdf", &bytes).unwrap();
        assert_eq!(doc.format, "pdf");
        assert!(doc.text.contains("quarterly revenue grew"), "got: {:?}", doc.text);
    }

    #[test]
    fn test_garbage_pdf_is_parse_failure() {
        let err = parse_upload("broken.pdf", b"not a pdf at all").unwrap_err();
        assert!(matches!(err, AssistantError::ParseFailure { .. }));
    }
}
