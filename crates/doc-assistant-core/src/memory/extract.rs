//! LLM-driven extraction of candidate memory facts from a turn.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AssistantError;
use crate::llm::Generator;
use crate::models::{ConversationContext, MemoryCandidate, Partition};

#[derive(Clone)]
pub struct MemoryExtractor {
    generator: Arc<dyn Generator>,
}

impl MemoryExtractor {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Propose durable facts from `turn_text`. Performs no filtering; the
    /// writer owns the confidence and dedup policy.
    pub async fn extract(
        &self,
        turn_text: &str,
        context: &ConversationContext,
    ) -> Result<Vec<MemoryCandidate>, AssistantError> {
        if turn_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_extraction_prompt(turn_text, context);
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| AssistantError::GenerationFailure(e.to_string()))?;

        let candidates = parse_candidates(&raw);
        debug!(count = candidates.len(), "extracted memory candidates");
        Ok(candidates)
    }
}

pub fn build_extraction_prompt(turn_text: &str, context: &ConversationContext) -> String {
    let mut prompt = String::from(
        "Analyze this conversation turn and extract ONLY high-signal, reusable facts worth remembering.\n\
         Rules:\n\
         - USER facts: personal preferences, role, workflow habits (e.g. \"User prefers weekly summaries on Mondays\", \"User is a Project Finance Analyst\")\n\
         - COMPANY facts: organization-wide learnings, relationships between teams, recurring bottlenecks (e.g. \"Asset Management interfaces with Project Finance\")\n\
         - Do NOT store: transcript fragments, secrets, credentials, personal identifiers, small talk\n\
         - Be selective: at most 2 facts per turn, only when you are confident\n\n",
    );

    if !context.known_facts.is_empty() {
        prompt.push_str("Already known (do not repeat):\n");
        for fact in &context.known_facts {
            prompt.push_str(&format!("- {}\n", fact));
        }
        prompt.push('\n');
    }

    prompt.push_str("Conversation turn:\n");
    prompt.push_str(turn_text);
    prompt.push_str(
        "\n\nRespond with a JSON array of objects, each: \
         {\"target\": \"USER\" or \"COMPANY\", \"summary\": \"brief fact\", \"confidence\": 0.0-1.0}\n\
         If nothing is worth storing, return: []\n\
         Example: [{\"target\": \"USER\", \"summary\": \"User prefers weekly summaries on Mondays.\", \"confidence\": 0.9}]",
    );
    prompt
}

/// Parse the extractor's JSON reply.
///
/// Tolerates a surrounding markdown code fence and prose around the array.
/// Items without a known target, a non-empty summary, or a numeric
/// confidence are skipped. Unparseable output yields no candidates.
pub fn parse_candidates(raw: &str) -> Vec<MemoryCandidate> {
    let body = strip_code_fence(raw.trim());

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(first_err) => {
            let embedded = match (body.find('['), body.rfind(']')) {
                (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]).ok(),
                _ => None,
            };
            match embedded {
                Some(v) => v,
                None => {
                    warn!(error = %first_err, "memory extractor returned unparseable output");
                    return Vec::new();
                }
            }
        }
    };

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => {
            warn!("memory extractor output is not a JSON array");
            return Vec::new();
        }
    };

    items.iter().filter_map(parse_item).collect()
}

fn parse_item(item: &Value) -> Option<MemoryCandidate> {
    let target = item
        .get("target")
        .or_else(|| item.get("partition"))
        .and_then(Value::as_str)
        .and_then(Partition::from_label);
    let summary = item
        .get("summary")
        .or_else(|| item.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let confidence = item.get("confidence").and_then(Value::as_f64);

    match (target, summary, confidence) {
        (Some(target_partition), Some(content), Some(confidence)) => Some(MemoryCandidate {
            content: content.to_string(),
            target_partition,
            confidence: confidence as f32,
        }),
        _ => {
            debug!(item = %item, "skipping malformed memory candidate");
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line, then the closing fence.
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => return "",
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedGenerator;
    use crate::models::Turn;

    #[test]
    fn test_parse_plain_array() {
        let raw = r#"[{"target": "USER", "summary": "User prefers weekly summaries on Mondays.", "confidence": 0.9}]"#;
        let c = parse_candidates(raw);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].target_partition, Partition::User);
        assert_eq!(c[0].content, "User prefers weekly summaries on Mondays.");
        assert!((c[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_fenced_and_company_label() {
        let raw = "```json\n[{\"target\": \"COMPANY\", \"summary\": \"Asset Management interfaces with Project Finance\", \"confidence\": 0.85}]\n```";
        let c = parse_candidates(raw);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].target_partition, Partition::Organization);
    }

    #[test]
    fn test_parse_skips_malformed_items() {
        let raw = r#"[
            {"target": "USER", "summary": "ok", "confidence": 0.95},
            {"target": "TEAM", "summary": "unknown target", "confidence": 0.9},
            {"target": "USER", "summary": "   ", "confidence": 0.9},
            {"target": "USER", "summary": "no confidence"},
            "not an object"
        ]"#;
        let c = parse_candidates(raw);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].content, "ok");
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        assert!(parse_candidates("I don't think anything is worth storing.").is_empty());
        assert!(parse_candidates("").is_empty());
        assert!(parse_candidates("```\n```").is_empty());
    }

    #[test]
    fn test_parse_array_inside_prose() {
        let raw = "Here you go:\n[{\"target\": \"ORG\", \"summary\": \"Finance closes books on day 5\", \"confidence\": 0.8}]\nThanks";
        let c = parse_candidates(raw);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].target_partition, Partition::Organization);
    }

    #[test]
    fn test_low_confidence_is_not_filtered_here() {
        let raw = r#"[{"target": "USER", "summary": "maybe likes tea", "confidence": 0.3}]"#;
        assert_eq!(parse_candidates(raw).len(), 1);
    }

    #[tokio::test]
    async fn test_extract_sends_turn_and_parses() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            r#"[{"target": "USER", "summary": "User prefers weekly summaries on Mondays.", "confidence": 0.92}]"#,
        )]));
        let extractor = MemoryExtractor::new(generator.clone());
        let turn = Turn::new("I prefer weekly summaries on Mondays", "Noted.");

        let c = extractor
            .extract(&turn.render(), &ConversationContext::default())
            .await
            .unwrap();
        assert_eq!(c.len(), 1);
        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains("User: I prefer weekly summaries on Mondays\nAssistant: Noted."));
    }

    #[tokio::test]
    async fn test_extract_llm_failure_is_generation_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err("timeout")]));
        let extractor = MemoryExtractor::new(generator);
        let err = extractor
            .extract("User: hi\nAssistant: hello", &ConversationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::GenerationFailure(_)));
    }
}
