//! Grounded answer composition.
//!
//! The composer retrieves passages for the question, renders them into a
//! citation-instructed prompt, and makes exactly one LLM call. When
//! retrieval finds nothing it returns [`NO_ANSWER`] without calling the LLM,
//! so an answer never appears without grounding content.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AssistantError;
use crate::llm::Generator;
use crate::models::{Citation, ConversationContext};
use crate::retrieve::{Passage, Retrieval, Retriever};

/// Fallback text returned when retrieval finds nothing relevant.
pub const NO_ANSWER: &str = "I couldn't find relevant information in the uploaded documents.";

/// An answer and the citations it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Empty exactly when `grounded` is false.
    pub citations: Vec<Citation>,
    /// False for the [`NO_ANSWER`] fallback.
    pub grounded: bool,
}

impl Answer {
    pub fn fallback() -> Self {
        Self {
            text: NO_ANSWER.to_string(),
            citations: Vec::new(),
            grounded: false,
        }
    }
}

#[derive(Clone)]
pub struct AnswerComposer {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl AnswerComposer {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        context: &ConversationContext,
    ) -> Result<Answer, AssistantError> {
        let passages = match self.retriever.retrieve(question).await? {
            Retrieval::NoRelevantContent => {
                info!("no relevant content, returning fallback answer");
                return Ok(Answer::fallback());
            }
            Retrieval::Found(passages) => passages,
        };

        let prompt = build_prompt(question, &passages, context);
        debug!(
            passages = passages.len(),
            backend = self.generator.backend_name(),
            "generating grounded answer"
        );

        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| AssistantError::GenerationFailure(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::GenerationFailure(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(Answer {
            text: text.to_string(),
            citations: passages.into_iter().map(|p| p.citation).collect(),
            grounded: true,
        })
    }
}

/// Render the grounded-answer prompt.
pub fn build_prompt(question: &str, passages: &[Passage], context: &ConversationContext) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a helpful assistant that answers questions using ONLY the context passages below.\n",
    );
    prompt.push_str(&format!(
        "If the passages do not contain the answer, reply exactly: \"{}\"\n",
        NO_ANSWER
    ));
    prompt.push_str("Do not invent information or cite sources that are not listed.\n\n");

    if !context.known_facts.is_empty() {
        prompt.push_str("Known context about the user and organization:\n");
        for fact in &context.known_facts {
            prompt.push_str(&format!("- {}\n", fact));
        }
        prompt.push('\n');
    }

    let history = context.render_history();
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(&history);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Context passages:\n");
    let rendered: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[{}] (Source: {}, Locator: {})\n{}",
                i + 1,
                p.citation.source,
                p.citation.locator,
                p.text
            )
        })
        .collect();
    prompt.push_str(&rendered.join("\n\n"));
    prompt.push_str("\n\n");

    prompt.push_str(
        "Cite every fact you state in this exact format: [Source: filename, Locator: locator]\n",
    );
    prompt.push_str("Example: [Source: report.pdf, Locator: Results (chunk 2)]\n\n");
    prompt.push_str(&format!("Question: {}\n\nAnswer (with inline citations):", question));
    prompt
}
