//! Typed failure kinds shared by every pipeline stage.
//!
//! "No relevant content" is not an error: an empty retrieval is a
//! normal outcome ([`Retrieval::NoRelevantContent`](crate::retrieve::Retrieval))
//! and must never be confused with a [`GenerationFailure`](AssistantError::GenerationFailure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// A document could not be converted to text. Aborts that document only.
    #[error("failed to parse {source_name}: {message}")]
    ParseFailure {
        source_name: String,
        message: String,
    },

    /// The embedding capability failed or timed out.
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    /// The LLM capability failed or timed out.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// A memory partition could not be read or appended to.
    #[error("memory write failed: {0}")]
    MemoryWriteFailure(String),

    /// The vector store rejected a read or write.
    #[error("vector store error: {0}")]
    Store(String),
}

impl AssistantError {
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AssistantError::ParseFailure {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code, used by the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::ParseFailure { .. } => "parse_failure",
            AssistantError::EmbeddingFailure(_) => "embedding_failure",
            AssistantError::GenerationFailure(_) => "generation_failure",
            AssistantError::MemoryWriteFailure(_) => "memory_write_failure",
            AssistantError::Store(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_source() {
        let err = AssistantError::parse("notes.pdf", "not a pdf");
        assert_eq!(err.to_string(), "failed to parse notes.pdf: not a pdf");
        assert_eq!(err.code(), "parse_failure");
    }

    #[test]
    fn test_generation_and_embedding_codes_differ() {
        let gen = AssistantError::GenerationFailure("down".into());
        let emb = AssistantError::EmbeddingFailure("down".into());
        assert_ne!(gen.code(), emb.code());
    }
}
