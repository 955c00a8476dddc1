//! Response resolver - classifies a query payload into an [`Outcome`]
//!
//! The backend reports two independent flags. Together they select one of
//! four outcomes, and the outcome (not the raw text) decides which
//! sub-controller gets armed. Classification is pure; no I/O happens here.

use serde::Serialize;
use serde_json::Value;

use crate::backend::{answer_text, JargonItem, QueryPayload};

/// Shown when the tools cannot answer and the backend sent no text
pub const CAPABILITY_GAP_FALLBACK: &str =
    "Sorry, We are unable to answer the question with the available tools. Please provide the tool";

/// Prefix for answers surfaced for grounding review
pub const REVIEW_PREFIX: &str = "Current RAG response : ";

/// Classified backend answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Plain answer, nothing to arm
    Direct { text: String },
    /// Tools are missing; the user is asked to supply one
    CapabilityGap { text: String },
    /// Grounded answer the user should confirm or correct
    NeedsReview { text: String, jargon: Vec<JargonItem> },
    /// Both signals set; handled as a capability gap
    CapabilityGapWithReview { text: String },
}

impl Outcome {
    /// Text to install into the timeline
    pub fn text(&self) -> &str {
        match self {
            Self::Direct { text }
            | Self::CapabilityGap { text }
            | Self::NeedsReview { text, .. }
            | Self::CapabilityGapWithReview { text } => text,
        }
    }

    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            Self::CapabilityGap { .. } | Self::CapabilityGapWithReview { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::CapabilityGap { .. } => "capability_gap",
            Self::NeedsReview { .. } => "needs_review",
            Self::CapabilityGapWithReview { .. } => "capability_gap_with_review",
        }
    }
}

/// Classify a query payload
pub fn resolve(payload: &QueryPayload) -> Outcome {
    let missing_capability = payload.missing_capability.unwrap_or(false);
    let needs_review = payload.needs_review.unwrap_or(false);

    match (missing_capability, needs_review) {
        (false, false) => Outcome::Direct {
            text: answer_text(&payload.final_answer),
        },
        (true, false) => Outcome::CapabilityGap {
            text: gap_text(&payload.final_answer),
        },
        (false, true) => {
            let grounded = payload.final_answer.get(1);
            let func_response = grounded
                .and_then(|g| g.get("func_response"))
                .map(answer_text)
                .unwrap_or_default();
            Outcome::NeedsReview {
                text: format!("{}{}", REVIEW_PREFIX, func_response),
                jargon: grounded.map(jargon_items).unwrap_or_default(),
            }
        }
        (true, true) => Outcome::CapabilityGapWithReview {
            text: gap_text(&payload.final_answer),
        },
    }
}

fn gap_text(answer: &Value) -> String {
    let text = answer_text(answer);
    if text.trim().is_empty() || matches!(answer, Value::Bool(false)) {
        CAPABILITY_GAP_FALLBACK.to_string()
    } else {
        text
    }
}

fn jargon_items(grounded: &Value) -> Vec<JargonItem> {
    let Some(items) = grounded.get("jargon").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| serde_json::from_value::<JargonItem>(item.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(missing: bool, review: bool, answer: Value) -> QueryPayload {
        QueryPayload {
            missing_capability: Some(missing),
            needs_review: Some(review),
            final_answer: answer,
        }
    }

    #[test]
    fn test_direct_answer_is_verbatim() {
        let outcome = resolve(&payload(false, false, json!("Paris")));
        assert_eq!(
            outcome,
            Outcome::Direct {
                text: "Paris".to_string()
            }
        );
    }

    #[test]
    fn test_capability_gap_falls_back_when_empty() {
        for answer in [json!(""), Value::Null, json!("   ")] {
            let outcome = resolve(&payload(true, false, answer));
            assert_eq!(outcome.text(), CAPABILITY_GAP_FALLBACK);
            assert!(outcome.is_capability_gap());
        }
    }

    #[test]
    fn test_capability_gap_keeps_backend_text() {
        let outcome = resolve(&payload(true, false, json!("need a currency tool")));
        assert_eq!(outcome.text(), "need a currency tool");
    }

    #[test]
    fn test_needs_review_extracts_func_response_and_jargon() {
        let outcome = resolve(&payload(
            false,
            true,
            json!(["x", {"func_response": "42", "jargon": [{"word": "GDP", "meaning": ""}]}]),
        ));

        match outcome {
            Outcome::NeedsReview { text, jargon } => {
                assert_eq!(text, "Current RAG response : 42");
                assert_eq!(jargon.len(), 1);
                assert_eq!(jargon[0].word, "GDP");
                assert_eq!(jargon[0].meaning.as_deref(), Some(""));
            }
            other => panic!("expected NeedsReview, got {:?}", other),
        }
    }

    #[test]
    fn test_needs_review_tolerates_missing_grounded_answer() {
        let outcome = resolve(&payload(false, true, json!("flat")));
        assert_eq!(outcome.text(), REVIEW_PREFIX);
        assert!(matches!(outcome, Outcome::NeedsReview { ref jargon, .. } if jargon.is_empty()));
    }

    #[test]
    fn test_numeric_func_response_is_rendered() {
        let outcome = resolve(&payload(false, true, json!([null, {"func_response": 7.5}])));
        assert_eq!(outcome.text(), "Current RAG response : 7.5");
    }

    #[test]
    fn test_both_flags_behave_like_capability_gap() {
        let outcome = resolve(&payload(true, true, json!(["x", {"func_response": "1"}])));
        assert!(matches!(outcome, Outcome::CapabilityGapWithReview { .. }));
        assert!(outcome.is_capability_gap());

        let empty = resolve(&payload(true, true, Value::Null));
        assert_eq!(empty.text(), CAPABILITY_GAP_FALLBACK);
    }

    #[test]
    fn test_missing_flags_default_to_direct() {
        let outcome = resolve(&QueryPayload {
            final_answer: json!("ok"),
            ..Default::default()
        });
        assert_eq!(outcome.kind(), "direct");
    }
}
