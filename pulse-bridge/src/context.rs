//! Compact-context assembly.
//!
//! Builds the bounded JSON summary the model is allowed to see. Three
//! rules keep it honest:
//! - `total_customers` always comes from the store aggregate, never
//!   from the truncated sample, so counts stay exact.
//! - the sample is size-capped and carries only scoring fields — no
//!   raw source data, no identifiers beyond the company name.
//! - serialization respects a hard character budget; over budget, the
//!   sample drops to the top-spender subset first, and as a last
//!   resort the payload is cut at a char boundary with an explicit
//!   truncation marker. Same inputs, same truncation point.

use serde::Serialize;

use pulse_pipeline::canonical::CustomerRecord;
use pulse_pipeline::record_store::{AggregateMetrics, RecordStore, SegmentRollup};
use pulse_scoring::{RiskLevel, Segment};

use crate::intent::QueryIntent;

/// Hard cap on the customer sample.
pub const DEFAULT_SAMPLE_CAP: usize = 50;
/// Size of the highest-spend subset.
pub const DEFAULT_TOP_N: usize = 5;
/// Default character budget for the serialized context.
pub const DEFAULT_CHAR_BUDGET: usize = 6_000;
/// Marker appended when the payload had to be cut.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Churn threshold used when routing a churn-intent question.
const AT_RISK_THRESHOLD: f64 = 0.5;
/// Spend threshold used when routing a high-value question.
const HIGH_VALUE_THRESHOLD: f64 = 10_000.0;
/// Upsell threshold used when routing an upsell question.
const UPSELL_THRESHOLD: f64 = 0.5;
/// Row cap for the intent-routed customer list.
const ROUTED_LIMIT: usize = 10;

/// The scoring-relevant projection of one customer. This is all the
/// model ever learns about a record.
#[derive(Clone, Debug, Serialize)]
pub struct ContextCustomer {
    pub company_name: String,
    pub segment: Segment,
    pub risk_level: RiskLevel,
    pub churn_probability: f64,
    pub upsell_score: f64,
    pub total_spent: f64,
    pub engagement_score: i64,
}

impl From<&CustomerRecord> for ContextCustomer {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            company_name: record.company_name.clone(),
            segment: record.segment,
            risk_level: record.risk_level,
            churn_probability: record.churn_probability,
            upsell_score: record.upsell_score,
            total_spent: record.total_spent,
            engagement_score: record.engagement_score,
        }
    }
}

/// The bounded context handed to the model (and to the deterministic
/// answer generator).
#[derive(Clone, Debug, Serialize)]
pub struct CompactContext {
    pub intent: QueryIntent,
    /// Exact partition size from the aggregate, never the sample length.
    pub total_customers: usize,
    pub metrics: AggregateMetrics,
    /// Intent-routed customers most relevant to the question.
    pub customers: Vec<ContextCustomer>,
    /// Bounded general sample.
    pub sample: Vec<ContextCustomer>,
    /// Highest-spend subset, always present.
    pub top_spenders: Vec<ContextCustomer>,
    /// Populated for segment-intent questions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentRollup>,
}

impl CompactContext {
    /// Lowercased company names present anywhere in this context.
    /// Reference validation matches against these.
    pub fn known_companies(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sample
            .iter()
            .chain(&self.customers)
            .chain(&self.top_spenders)
            .map(|c| c.company_name.to_lowercase())
            .collect();
        names.extend(
            self.segments
                .iter()
                .map(|s| s.segment.to_string().to_lowercase()),
        );
        names.sort();
        names.dedup();
        names
    }
}

/// Builds `CompactContext` values within fixed size bounds.
pub struct ContextAssembler {
    pub sample_cap: usize,
    pub top_n: usize,
    pub char_budget: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
            top_n: DEFAULT_TOP_N,
            char_budget: DEFAULT_CHAR_BUDGET,
        }
    }
}

impl ContextAssembler {
    /// Assemble the context for one question against one user's data.
    pub fn build(&self, user_query: &str, store: &RecordStore, user_id: &str) -> CompactContext {
        let intent = QueryIntent::detect(user_query);
        let metrics = store.aggregate(user_id);
        let total_customers = metrics.total_customers;

        let page = store.query(user_id, |_| true, self.sample_cap, 0);
        let sample: Vec<ContextCustomer> = page.records.iter().map(Into::into).collect();
        let top_spenders: Vec<ContextCustomer> = store
            .top_spenders(user_id, self.top_n)
            .iter()
            .map(Into::into)
            .collect();

        let mut segments = Vec::new();
        let customers: Vec<ContextCustomer> = match intent {
            QueryIntent::ChurnRisk => store
                .at_risk(user_id, AT_RISK_THRESHOLD, ROUTED_LIMIT)
                .iter()
                .map(Into::into)
                .collect(),
            QueryIntent::HighValue => store
                .high_value(user_id, HIGH_VALUE_THRESHOLD, ROUTED_LIMIT)
                .iter()
                .map(Into::into)
                .collect(),
            QueryIntent::Upsell => store
                .upsell(user_id, UPSELL_THRESHOLD, ROUTED_LIMIT)
                .iter()
                .map(Into::into)
                .collect(),
            QueryIntent::Segments => {
                segments = store.segment_rollup(user_id);
                Vec::new()
            }
            QueryIntent::General => {
                let take = ROUTED_LIMIT.min(sample.len());
                sample[..take].to_vec()
            }
        };

        CompactContext {
            intent,
            total_customers,
            metrics,
            customers,
            sample,
            top_spenders,
            segments,
        }
    }

    /// Serialize a context under the character budget. Deterministic:
    /// equal contexts serialize and truncate identically.
    pub fn to_prompt_json(&self, context: &CompactContext) -> String {
        let full = match serde_json::to_string(context) {
            Ok(json) => json,
            Err(err) => {
                log::error!("context serialization failed: {err}");
                return String::new();
            }
        };
        if full.len() <= self.char_budget {
            return full;
        }

        // First relief valve: the sample collapses to the top spenders.
        let mut trimmed = context.clone();
        trimmed.sample = trimmed.top_spenders.clone();
        let reduced = match serde_json::to_string(&trimmed) {
            Ok(json) => json,
            Err(_) => full,
        };
        if reduced.len() <= self.char_budget {
            return reduced;
        }

        truncate_with_marker(&reduced, self.char_budget)
    }
}

/// Cut a payload to the budget on a char boundary and append the
/// truncation marker.
fn truncate_with_marker(payload: &str, budget: usize) -> String {
    let keep = budget.saturating_sub(TRUNCATION_MARKER.len());
    let mut end = keep.min(payload.len());
    while end > 0 && !payload.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &payload[..end], TRUNCATION_MARKER)
}
