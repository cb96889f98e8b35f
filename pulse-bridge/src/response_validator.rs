//! Response validation — the output constraint layer.
//!
//! The model's reply is only trusted after it survives three checks:
//! a JSON object must actually be present in the text, the `answer`
//! field must be a non-empty string, and every reference must name a
//! company the context actually contains. Invalid references are
//! dropped silently; a reply that fails the structural checks routes
//! the whole turn to the deterministic fallback instead.

use serde_json::Value;
use thiserror::Error;

use crate::context::CompactContext;

/// A validated, reference-filtered model reply.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantReply {
    pub answer: String,
    /// Company references that survived filtering.
    pub references: Vec<String>,
    pub actions: Vec<String>,
}

/// Why a reply was rejected wholesale.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output is not well-formed JSON: {0}")]
    Malformed(String),

    #[error("model output has no usable answer field")]
    MissingAnswer,
}

/// The substring from the first `{` to the last `}`, when both exist
/// in that order.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Does this reference name a company the context contains?
/// Case-insensitive; containment in either direction counts, so
/// "Acme" matches "Acme Corp" and vice versa.
fn names_known_company(reference: &str, known: &[String]) -> bool {
    let reference = reference.trim().to_lowercase();
    if reference.is_empty() {
        return false;
    }
    known
        .iter()
        .any(|name| name == &reference || name.contains(&reference) || reference.contains(name))
}

/// Validate raw model output against the context it was given.
pub fn validate(raw: &str, context: &CompactContext) -> Result<AssistantReply, ValidationFailure> {
    let json = extract_json_object(raw).ok_or(ValidationFailure::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationFailure::Malformed(e.to_string()))?;

    let answer = value
        .get("answer")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationFailure::MissingAnswer)?
        .to_string();

    let known = context.known_companies();
    let references: Vec<String> = string_list(value.get("references"))
        .into_iter()
        .filter(|r| names_known_company(r, &known))
        .collect();
    let actions = string_list(value.get("actions"));

    Ok(AssistantReply {
        answer,
        references,
        actions,
    })
}

/// Render a validated reply as one human-readable string.
pub fn format_reply(reply: &AssistantReply) -> String {
    let mut out = reply.answer.clone();
    if !reply.references.is_empty() {
        out.push_str("\n\nBased on: ");
        out.push_str(&reply.references.join(", "));
    }
    if !reply.actions.is_empty() {
        out.push_str("\n\nSuggested actions:");
        for action in &reply.actions {
            out.push_str("\n- ");
            out.push_str(action);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextCustomer;
    use crate::intent::QueryIntent;
    use pulse_pipeline::record_store::AggregateMetrics;
    use pulse_scoring::{RiskLevel, Segment};

    fn context_with(companies: &[&str]) -> CompactContext {
        CompactContext {
            intent: QueryIntent::General,
            total_customers: companies.len(),
            metrics: AggregateMetrics::default(),
            customers: Vec::new(),
            sample: companies
                .iter()
                .map(|name| ContextCustomer {
                    company_name: (*name).to_string(),
                    segment: Segment::Standard,
                    risk_level: RiskLevel::Low,
                    churn_probability: 0.1,
                    upsell_score: 0.1,
                    total_spent: 100.0,
                    engagement_score: 50,
                })
                .collect(),
            top_spenders: Vec::new(),
            segments: Vec::new(),
        }
    }

    #[test]
    fn valid_reply_passes() {
        let context = context_with(&["Acme Corp", "Globex"]);
        let raw = r#"Here you go: {"answer": "Acme Corp looks risky.",
            "references": ["Acme Corp"], "actions": ["Call them"]}"#;
        let reply = validate(raw, &context).unwrap();
        assert_eq!(reply.answer, "Acme Corp looks risky.");
        assert_eq!(reply.references, vec!["Acme Corp"]);
        assert_eq!(reply.actions, vec!["Call them"]);
    }

    #[test]
    fn non_json_text_is_rejected() {
        let context = context_with(&["Acme"]);
        assert_eq!(
            validate("I cannot answer that.", &context).unwrap_err(),
            ValidationFailure::NoJsonObject
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        let context = context_with(&["Acme"]);
        assert!(matches!(
            validate(r#"{"answer": }"#, &context).unwrap_err(),
            ValidationFailure::Malformed(_)
        ));
    }

    #[test]
    fn missing_or_empty_answer_is_rejected() {
        let context = context_with(&["Acme"]);
        assert_eq!(
            validate(r#"{"references": []}"#, &context).unwrap_err(),
            ValidationFailure::MissingAnswer
        );
        assert_eq!(
            validate(r#"{"answer": "   "}"#, &context).unwrap_err(),
            ValidationFailure::MissingAnswer
        );
        assert_eq!(
            validate(r#"{"answer": 42}"#, &context).unwrap_err(),
            ValidationFailure::MissingAnswer
        );
    }

    #[test]
    fn unknown_references_are_dropped_silently() {
        let context = context_with(&["Acme Corp"]);
        let raw = r#"{"answer": "ok", "references": ["Acme Corp", "Hallucinated Inc"]}"#;
        let reply = validate(raw, &context).unwrap();
        assert_eq!(reply.references, vec!["Acme Corp"]);
    }

    #[test]
    fn reference_matching_is_case_insensitive_containment() {
        let context = context_with(&["Acme Corp"]);
        let raw = r#"{"answer": "ok", "references": ["acme", "ACME CORP"]}"#;
        let reply = validate(raw, &context).unwrap();
        assert_eq!(reply.references.len(), 2);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let context = context_with(&["Acme"]);
        let reply = validate(r#"{"answer": "fine"}"#, &context).unwrap();
        assert!(reply.references.is_empty());
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn extraction_spans_first_brace_to_last() {
        let raw = "noise {\"answer\": \"x\", \"nested\": {\"a\": 1}} trailing";
        let json = extract_json_object(raw).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
        assert!(serde_json::from_str::<Value>(json).is_ok());
    }

    #[test]
    fn formatted_reply_combines_sections() {
        let reply = AssistantReply {
            answer: "Two customers need attention.".into(),
            references: vec!["Acme".into()],
            actions: vec!["Schedule a call".into()],
        };
        let text = format_reply(&reply);
        assert!(text.contains("Two customers need attention."));
        assert!(text.contains("Based on: Acme"));
        assert!(text.contains("- Schedule a call"));
    }
}
