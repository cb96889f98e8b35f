//! Narrative insight generation for a scored batch.
//!
//! Produces the headline summary, key-insight strings, and the fixed
//! recommendation list that accompany every scoring outcome.

use crate::thresholds::{ACTION_INTERVENE, RISK_HIGH_CHURN};
use crate::types::{
    ChurnPrediction, CustomerInput, InsightSummary, Insights, SegmentSummary, UpsellOpportunity,
};

/// Build insights from the assembled batch results.
pub fn generate_insights(
    customers: &[CustomerInput],
    segments: &[SegmentSummary],
    churn_predictions: &[ChurnPrediction],
    upsell_opportunities: &[UpsellOpportunity],
) -> Insights {
    let total_customers = customers.len();
    let total_revenue: f64 = customers.iter().map(|c| c.total_spent).sum();
    let average_engagement = if total_customers > 0 {
        customers.iter().map(|c| c.engagement_score as f64).sum::<f64>() / total_customers as f64
    } else {
        0.0
    };

    let churning = churn_predictions
        .iter()
        .filter(|p| p.churn_probability > RISK_HIGH_CHURN)
        .count();
    let churn_rate = if total_customers > 0 {
        churning as f64 / total_customers as f64 * 100.0
    } else {
        0.0
    };

    let high_risk = churn_predictions
        .iter()
        .filter(|p| p.churn_probability > ACTION_INTERVENE)
        .count();
    let potential_revenue: f64 = upsell_opportunities
        .iter()
        .map(|u| u.potential_value - u.current_value)
        .sum();

    let mut key_insights = vec![
        format!("{} distinct customer segments identified", segments.len()),
        format!("{} high-risk customers need immediate attention", high_risk),
        format!(
            "{} upsell opportunities with potential revenue of ${:.0}",
            upsell_opportunities.len(),
            potential_revenue
        ),
    ];
    if total_customers > 0 {
        key_insights.push(format!(
            "Average customer value: ${:.0}",
            total_revenue / total_customers as f64
        ));
    }
    if let Some(top) = segments.iter().max_by(|a, b| {
        a.revenue
            .partial_cmp(&b.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        key_insights.push(format!("Top performing segment: {}", top.name));
    }

    Insights {
        summary: InsightSummary {
            total_customers,
            total_revenue,
            average_engagement,
            churn_rate,
            upsell_opportunities: upsell_opportunities.len(),
        },
        key_insights,
        recommendations: vec![
            "Focus on high-risk customers to reduce churn".to_string(),
            "Run targeted upsell campaigns for high potential customers".to_string(),
            "Develop segment-specific engagement cadences".to_string(),
        ],
    }
}
