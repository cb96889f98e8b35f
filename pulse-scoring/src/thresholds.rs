//! Rule thresholds for the fallback scoring model.
//!
//! These constants are the whole model. They were tuned against the
//! original production behavior and are preserved verbatim — in
//! particular the 0.95 probability ceiling and the 999-day recency
//! assigned to customers with no recorded interaction. Changing either
//! silently shifts every downstream segment, risk level, and upsell
//! list.

/// Segment gate: spend above this plus high engagement is High Value.
pub const HIGH_VALUE_SPEND: f64 = 50_000.0;
/// Segment gate: engagement floor for High Value.
pub const HIGH_VALUE_ENGAGEMENT: i64 = 80;
/// Segment gate: spend floor for Medium Value.
pub const MEDIUM_VALUE_SPEND: f64 = 20_000.0;
/// Segment gate: engagement floor for Medium Value.
pub const MEDIUM_VALUE_ENGAGEMENT: i64 = 60;
/// Segment gate: spend floor for Low Value.
pub const LOW_VALUE_SPEND: f64 = 5_000.0;
/// Segment gate: engagement below this is At Risk.
pub const AT_RISK_ENGAGEMENT: i64 = 30;

/// Churn model: base probability every customer starts from.
pub const CHURN_BASE: f64 = 0.1;
/// Churn factor: engagement below 30.
pub const CHURN_LOW_ENGAGEMENT: f64 = 0.4;
/// Churn factor: engagement below 50.
pub const CHURN_MID_ENGAGEMENT: f64 = 0.2;
/// Churn factor: more than 5 support tickets.
pub const CHURN_HEAVY_TICKETS: f64 = 0.2;
/// Churn factor: more than 2 support tickets.
pub const CHURN_SOME_TICKETS: f64 = 0.1;
/// Churn factor: last interaction more than 90 days ago.
pub const CHURN_STALE: f64 = 0.3;
/// Churn factor: last interaction more than 30 days ago.
pub const CHURN_AGING: f64 = 0.1;
/// Engagement gate for the low-engagement churn factor.
pub const CHURN_LOW_ENGAGEMENT_GATE: i64 = 30;
/// Engagement gate for the mid-engagement churn factor.
pub const CHURN_MID_ENGAGEMENT_GATE: i64 = 50;
/// Ticket-count gate for the heavy-tickets churn factor.
pub const CHURN_HEAVY_TICKETS_GATE: u32 = 5;
/// Ticket-count gate for the some-tickets churn factor.
pub const CHURN_SOME_TICKETS_GATE: u32 = 2;
/// Recency gate (days) for the stale churn factor.
pub const RECENCY_STALE_DAYS: i64 = 90;
/// Recency gate (days) for the aging churn factor.
pub const RECENCY_AGING_DAYS: i64 = 30;
/// Recency assigned when no interaction date is recorded. Deliberately
/// past the stale gate so missing history reads as "very stale".
pub const MISSING_RECENCY_DAYS: i64 = 999;

/// Upsell model: base score every customer starts from.
pub const UPSELL_BASE: f64 = 0.1;
/// Upsell factor: spend above 10k.
pub const UPSELL_HIGH_SPEND: f64 = 0.3;
/// Upsell factor: spend above 5k.
pub const UPSELL_MID_SPEND: f64 = 0.2;
/// Spend gate for the high-spend upsell factor.
pub const UPSELL_HIGH_SPEND_GATE: f64 = 10_000.0;
/// Spend gate for the mid-spend upsell factor.
pub const UPSELL_MID_SPEND_GATE: f64 = 5_000.0;
/// Upsell factor: engagement above 70.
pub const UPSELL_HIGH_ENGAGEMENT: f64 = 0.3;
/// Upsell factor: engagement above 50.
pub const UPSELL_MID_ENGAGEMENT: f64 = 0.2;
/// Engagement gate for the high-engagement upsell factor.
pub const UPSELL_HIGH_ENGAGEMENT_GATE: i64 = 70;
/// Engagement gate for the mid-engagement upsell factor.
pub const UPSELL_MID_ENGAGEMENT_GATE: i64 = 50;
/// Upsell factor: more than 5 purchases.
pub const UPSELL_FREQUENT: f64 = 0.2;
/// Upsell factor: more than 2 purchases.
pub const UPSELL_OCCASIONAL: f64 = 0.1;
/// Purchase-count gate for the frequent-buyer upsell factor.
pub const UPSELL_FREQUENT_GATE: u32 = 5;
/// Purchase-count gate for the occasional-buyer upsell factor.
pub const UPSELL_OCCASIONAL_GATE: u32 = 2;

/// Ceiling for churn probability and upsell score. The model saturates
/// at 0.95 and never emits 1.0.
pub const SCORE_CAP: f64 = 0.95;

/// Minimum upsell score for a customer to appear in the opportunity list.
pub const UPSELL_OPPORTUNITY_FLOOR: f64 = 0.5;
/// Projected value multiplier for an upsell opportunity.
pub const POTENTIAL_VALUE_MULTIPLIER: f64 = 1.5;

/// Risk gates: Critical when churn exceeds this or engagement is below
/// `RISK_CRITICAL_ENGAGEMENT`.
pub const RISK_CRITICAL_CHURN: f64 = 0.7;
pub const RISK_CRITICAL_ENGAGEMENT: i64 = 20;
/// Risk gates for High.
pub const RISK_HIGH_CHURN: f64 = 0.5;
pub const RISK_HIGH_ENGAGEMENT: i64 = 40;
/// Risk gates for Medium.
pub const RISK_MEDIUM_CHURN: f64 = 0.3;
pub const RISK_MEDIUM_ENGAGEMENT: i64 = 60;

/// Confidence label gates for upsell opportunities.
pub const CONFIDENCE_VERY_HIGH: f64 = 0.8;
pub const CONFIDENCE_HIGH: f64 = 0.6;
pub const CONFIDENCE_MEDIUM: f64 = 0.4;

/// Churn-action gates: immediate intervention above this probability.
pub const ACTION_INTERVENE: f64 = 0.7;
/// Churn-action gates: re-engagement campaign above this probability.
pub const ACTION_REENGAGE: f64 = 0.4;

/// Recency gate (days) for the "No recent activity" key factor.
pub const FACTOR_INACTIVE_DAYS: i64 = 180;
/// Engagement gate for the "Low engagement" key factor.
pub const FACTOR_LOW_ENGAGEMENT: i64 = 40;

/// Remote scoring request timeout in seconds.
pub const SCORING_TIMEOUT_SECS: u64 = 30;
