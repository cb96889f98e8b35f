//! Query-intent detection.
//!
//! The assistant recognizes exactly four analytical intents plus a
//! general catch-all. Detection is a fixed keyword scan in priority
//! order — no model involved — so the same question always routes to
//! the same store query and the same fallback answer.

use serde::Serialize;

/// Recognized analytical intents, checked in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QueryIntent {
    /// Who is likely to leave.
    ChurnRisk,
    /// Who spends the most.
    HighValue,
    /// Who to sell more to.
    Upsell,
    /// How the customer base breaks down.
    Segments,
    /// Anything else.
    General,
}

const CHURN_KEYWORDS: &[&str] = &["churn", "at risk", "at-risk", "leaving", "retention", "lose"];
const HIGH_VALUE_KEYWORDS: &[&str] = &["high value", "high-value", "top customer", "best customer", "biggest"];
const UPSELL_KEYWORDS: &[&str] = &["upsell", "opportunit", "expansion", "cross-sell", "sell more"];
const SEGMENT_KEYWORDS: &[&str] = &["segment", "group", "cluster", "tier", "breakdown"];

impl QueryIntent {
    /// Detect the intent of a user question.
    pub fn detect(query: &str) -> QueryIntent {
        let q = query.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| q.contains(k));
        if matches(CHURN_KEYWORDS) {
            QueryIntent::ChurnRisk
        } else if matches(HIGH_VALUE_KEYWORDS) {
            QueryIntent::HighValue
        } else if matches(UPSELL_KEYWORDS) {
            QueryIntent::Upsell
        } else if matches(SEGMENT_KEYWORDS) {
            QueryIntent::Segments
        } else {
            QueryIntent::General
        }
    }

    /// Human-readable description for logging.
    pub fn describe(&self) -> &'static str {
        match self {
            QueryIntent::ChurnRisk => "churn risk analysis",
            QueryIntent::HighValue => "high-value customer listing",
            QueryIntent::Upsell => "upsell opportunity detection",
            QueryIntent::Segments => "segment breakdown",
            QueryIntent::General => "general question",
        }
    }

    /// Follow-up prompts the UI can offer after a reply of this intent.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::ChurnRisk => &[
                "Which of these customers has the highest lifetime value?",
                "What should I do to retain them?",
            ],
            QueryIntent::HighValue => &[
                "Which high-value customers are at risk of churning?",
                "Show me upsell opportunities among them",
            ],
            QueryIntent::Upsell => &[
                "Which products should I pitch first?",
                "How engaged are these customers?",
            ],
            QueryIntent::Segments => &[
                "Which segment generates the most revenue?",
                "Show me the customers in the At Risk segment",
            ],
            QueryIntent::General => &[
                "Which customers are at risk of churning?",
                "Show me my best upsell opportunities",
                "How do my customer segments break down?",
            ],
        }
    }
}
