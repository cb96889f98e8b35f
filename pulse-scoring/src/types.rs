use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// The canonicalized fields the scoring model needs for one customer.
///
/// This is also the wire shape sent to the remote scoring service, so
/// field names match its request contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerInput {
    pub customer_id: String,
    pub company_name: String,
    /// Lifetime spend; non-negative.
    pub total_spent: f64,
    /// Engagement in [0, 100].
    pub engagement_score: i64,
    /// None means no interaction ever recorded — scored as very stale.
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub purchase_count: u32,
    pub support_tickets: u32,
}

// ---------------------------------------------------------------------------
// Derived categories
// ---------------------------------------------------------------------------

/// Customer tier derived from spend and engagement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "High Value")]
    HighValue,
    #[serde(rename = "Medium Value")]
    MediumValue,
    #[serde(rename = "Low Value")]
    LowValue,
    #[serde(rename = "At Risk")]
    AtRisk,
    Standard,
}

impl Segment {
    /// All segments in rule-priority order.
    pub const ALL: [Segment; 5] = [
        Segment::HighValue,
        Segment::MediumValue,
        Segment::LowValue,
        Segment::AtRisk,
        Segment::Standard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::HighValue => "High Value",
            Segment::MediumValue => "Medium Value",
            Segment::LowValue => "Low Value",
            Segment::AtRisk => "At Risk",
            Segment::Standard => "Standard",
        }
    }

    /// Parse a human segment name. Remote backends may invent their own
    /// segment labels; those return `None` and the caller keeps its
    /// locally derived segment.
    pub fn parse(name: &str) -> Option<Segment> {
        Segment::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Segment {
    fn default() -> Self {
        Segment::Standard
    }
}

/// Severity derived from churn probability and engagement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// The per-customer score set stamped onto stored records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerScores {
    pub segment: Segment,
    pub churn_probability: f64,
    pub upsell_score: f64,
    pub risk_level: RiskLevel,
}

// ---------------------------------------------------------------------------
// Batch output — the shape shared by the remote service and the fallback
// ---------------------------------------------------------------------------

/// One customer's churn prediction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChurnPrediction {
    pub customer_id: String,
    #[serde(default)]
    pub company_name: String,
    pub churn_probability: f64,
    /// Free-text level from the serving backend; records derive their
    /// typed risk level from churn + engagement, not from this string.
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub recommended_action: String,
}

/// One upsell opportunity (only customers above the opportunity floor).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpsellOpportunity {
    pub customer_id: String,
    #[serde(default)]
    pub company_name: String,
    pub upsell_score: f64,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub potential_value: f64,
    #[serde(default)]
    pub recommended_products: Vec<String>,
    #[serde(default)]
    pub confidence: String,
}

/// Roll-up for one segment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub name: String,
    pub count: usize,
    pub revenue: f64,
    #[serde(default, alias = "avgEngagement")]
    pub avg_engagement: f64,
    #[serde(default)]
    pub customers: Vec<String>,
}

/// Headline numbers for the insight block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total_customers: usize,
    pub total_revenue: f64,
    pub average_engagement: f64,
    /// Percentage of customers with churn probability above 0.5.
    pub churn_rate: f64,
    pub upsell_opportunities: usize,
}

/// Narrative insights derived from a scored batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub summary: InsightSummary,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Complete scoring result for a batch of customers.
///
/// Both the remote path and the fallback produce exactly this shape;
/// callers cannot tell which path served the request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoringOutcome {
    #[serde(default)]
    pub segments: Vec<SegmentSummary>,
    #[serde(default)]
    pub churn_predictions: Vec<ChurnPrediction>,
    #[serde(default)]
    pub upsell_opportunities: Vec<UpsellOpportunity>,
    #[serde(default)]
    pub insights: Insights,
}
