//! The rule-based fallback scoring model.
//!
//! Classifies each customer by fixed threshold rules over spend,
//! engagement, interaction recency, purchase frequency, and support
//! load. Every function here is pure: the same inputs always produce
//! the same segment, churn probability, and upsell score. The batch
//! entry point assembles the same output shape the remote scoring
//! service returns, so the two paths are interchangeable.
//!
//! Score derivations:
//! - Churn starts at a 0.1 base and accumulates factors for low
//!   engagement, support-ticket load, and stale interaction recency.
//! - Upsell starts at a 0.1 base and accumulates factors for spend,
//!   engagement, and purchase frequency.
//! - Both saturate at 0.95 — the model never claims certainty.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::insights::generate_insights;
use crate::thresholds::*;
use crate::types::{
    ChurnPrediction, CustomerInput, CustomerScores, RiskLevel, ScoringOutcome, Segment,
    SegmentSummary, UpsellOpportunity,
};

/// Days since the customer's last interaction, as the model sees it.
/// No recorded date reads as `MISSING_RECENCY_DAYS` — far past the
/// stale gate. Future-dated interactions clamp to zero.
pub fn days_since_interaction(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match last {
        Some(date) => (now - date).num_days().max(0),
        None => MISSING_RECENCY_DAYS,
    }
}

/// Segment assignment. Rules are evaluated in fixed priority order and
/// the first match wins.
pub fn segment_for(total_spent: f64, engagement: i64) -> Segment {
    if total_spent > HIGH_VALUE_SPEND && engagement > HIGH_VALUE_ENGAGEMENT {
        Segment::HighValue
    } else if total_spent > MEDIUM_VALUE_SPEND && engagement > MEDIUM_VALUE_ENGAGEMENT {
        Segment::MediumValue
    } else if total_spent > LOW_VALUE_SPEND {
        Segment::LowValue
    } else if engagement < AT_RISK_ENGAGEMENT {
        Segment::AtRisk
    } else {
        Segment::Standard
    }
}

/// Additive churn probability, capped at `SCORE_CAP`.
pub fn churn_probability(customer: &CustomerInput, now: DateTime<Utc>) -> f64 {
    let mut prob = CHURN_BASE;

    if customer.engagement_score < CHURN_LOW_ENGAGEMENT_GATE {
        prob += CHURN_LOW_ENGAGEMENT;
    } else if customer.engagement_score < CHURN_MID_ENGAGEMENT_GATE {
        prob += CHURN_MID_ENGAGEMENT;
    }

    if customer.support_tickets > CHURN_HEAVY_TICKETS_GATE {
        prob += CHURN_HEAVY_TICKETS;
    } else if customer.support_tickets > CHURN_SOME_TICKETS_GATE {
        prob += CHURN_SOME_TICKETS;
    }

    let recency = days_since_interaction(customer.last_interaction_date, now);
    if recency > RECENCY_STALE_DAYS {
        prob += CHURN_STALE;
    } else if recency > RECENCY_AGING_DAYS {
        prob += CHURN_AGING;
    }

    prob.min(SCORE_CAP)
}

/// Additive upsell score, capped at `SCORE_CAP`.
pub fn upsell_score(customer: &CustomerInput) -> f64 {
    let mut score = UPSELL_BASE;

    if customer.total_spent > UPSELL_HIGH_SPEND_GATE {
        score += UPSELL_HIGH_SPEND;
    } else if customer.total_spent > UPSELL_MID_SPEND_GATE {
        score += UPSELL_MID_SPEND;
    }

    if customer.engagement_score > UPSELL_HIGH_ENGAGEMENT_GATE {
        score += UPSELL_HIGH_ENGAGEMENT;
    } else if customer.engagement_score > UPSELL_MID_ENGAGEMENT_GATE {
        score += UPSELL_MID_ENGAGEMENT;
    }

    if customer.purchase_count > UPSELL_FREQUENT_GATE {
        score += UPSELL_FREQUENT;
    } else if customer.purchase_count > UPSELL_OCCASIONAL_GATE {
        score += UPSELL_OCCASIONAL;
    }

    score.min(SCORE_CAP)
}

/// Risk level from churn probability and engagement.
pub fn risk_level(churn: f64, engagement: i64) -> RiskLevel {
    if churn > RISK_CRITICAL_CHURN || engagement < RISK_CRITICAL_ENGAGEMENT {
        RiskLevel::Critical
    } else if churn > RISK_HIGH_CHURN || engagement < RISK_HIGH_ENGAGEMENT {
        RiskLevel::High
    } else if churn > RISK_MEDIUM_CHURN || engagement < RISK_MEDIUM_ENGAGEMENT {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Product recommendations tiered by spend bracket.
pub fn recommended_products(total_spent: f64) -> Vec<String> {
    let products: &[&str] = if total_spent > HIGH_VALUE_SPEND {
        &["Enterprise Plan", "Premium Support", "Advanced Analytics"]
    } else if total_spent > MEDIUM_VALUE_SPEND {
        &["Professional Plan", "Priority Support", "Custom Integration"]
    } else if total_spent > LOW_VALUE_SPEND {
        &["Standard Plan", "Basic Support", "Training Package"]
    } else {
        &["Starter Plan", "Onboarding Package"]
    };
    products.iter().map(|p| p.to_string()).collect()
}

/// Confidence label for an upsell score.
pub fn upsell_confidence(score: f64) -> &'static str {
    if score > CONFIDENCE_VERY_HIGH {
        "Very High"
    } else if score > CONFIDENCE_HIGH {
        "High"
    } else if score > CONFIDENCE_MEDIUM {
        "Medium"
    } else {
        "Low"
    }
}

/// Up to three human-readable churn drivers for one customer.
pub fn key_factors(customer: &CustomerInput, now: DateTime<Utc>) -> Vec<String> {
    let mut factors = Vec::new();
    if days_since_interaction(customer.last_interaction_date, now) > FACTOR_INACTIVE_DAYS {
        factors.push("No recent activity".to_string());
    }
    if customer.engagement_score < FACTOR_LOW_ENGAGEMENT {
        factors.push("Low engagement".to_string());
    }
    if customer.purchase_count == 0 {
        factors.push("No purchase history".to_string());
    }
    factors.truncate(3);
    factors
}

/// Recommended retention action for a churn probability.
pub fn churn_action(probability: f64) -> &'static str {
    if probability >= ACTION_INTERVENE {
        "Immediate intervention required - schedule call with account manager"
    } else if probability >= ACTION_REENGAGE {
        "Send re-engagement campaign and follow up"
    } else {
        "Monitor and maintain regular contact"
    }
}

/// Score one customer. Pure and idempotent.
pub fn score_customer(customer: &CustomerInput, now: DateTime<Utc>) -> CustomerScores {
    let churn = churn_probability(customer, now);
    CustomerScores {
        segment: segment_for(customer.total_spent, customer.engagement_score),
        churn_probability: churn,
        upsell_score: upsell_score(customer),
        risk_level: risk_level(churn, customer.engagement_score),
    }
}

/// Score a batch and assemble the full outcome: segment summaries,
/// per-customer churn predictions, the upsell opportunity list (scores
/// above the floor, sorted descending), and narrative insights.
pub fn score_batch(customers: &[CustomerInput], now: DateTime<Utc>) -> ScoringOutcome {
    let mut by_segment: HashMap<Segment, Vec<&CustomerInput>> = HashMap::new();
    let mut churn_predictions = Vec::with_capacity(customers.len());
    let mut opportunities = Vec::new();

    for customer in customers {
        let scores = score_customer(customer, now);
        by_segment.entry(scores.segment).or_default().push(customer);

        churn_predictions.push(ChurnPrediction {
            customer_id: customer.customer_id.clone(),
            company_name: customer.company_name.clone(),
            churn_probability: scores.churn_probability,
            risk_level: scores.risk_level.to_string(),
            key_factors: key_factors(customer, now),
            recommended_action: churn_action(scores.churn_probability).to_string(),
        });

        if scores.upsell_score > UPSELL_OPPORTUNITY_FLOOR {
            opportunities.push(UpsellOpportunity {
                customer_id: customer.customer_id.clone(),
                company_name: customer.company_name.clone(),
                upsell_score: scores.upsell_score,
                current_value: customer.total_spent,
                potential_value: customer.total_spent * POTENTIAL_VALUE_MULTIPLIER,
                recommended_products: recommended_products(customer.total_spent),
                confidence: upsell_confidence(scores.upsell_score).to_string(),
            });
        }
    }

    opportunities.sort_by(|a, b| {
        b.upsell_score
            .partial_cmp(&a.upsell_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let segments: Vec<SegmentSummary> = Segment::ALL
        .iter()
        .filter_map(|segment| {
            let members = by_segment.get(segment)?;
            let revenue: f64 = members.iter().map(|c| c.total_spent).sum();
            let avg_engagement =
                members.iter().map(|c| c.engagement_score as f64).sum::<f64>() / members.len() as f64;
            Some(SegmentSummary {
                name: segment.to_string(),
                count: members.len(),
                revenue,
                avg_engagement,
                customers: members.iter().map(|c| c.customer_id.clone()).collect(),
            })
        })
        .collect();

    let insights = generate_insights(customers, &segments, &churn_predictions, &opportunities);

    ScoringOutcome {
        segments,
        churn_predictions,
        upsell_opportunities: opportunities,
        insights,
    }
}
