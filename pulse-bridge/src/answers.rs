//! Deterministic fallback answers.
//!
//! When the model is unreachable or its reply fails validation, the
//! turn is answered from the context alone: real numbers, fixed
//! templates, no generation. Keyed by the detected intent.

use crate::context::{CompactContext, ContextCustomer};
use crate::intent::QueryIntent;

/// The capability statement used when nothing better can be said.
pub const CAPABILITY_STATEMENT: &str =
    "I can help with churn risk, upsell opportunities, high-value customers, \
     and segmentation. Try asking which customers are at risk of churning.";

/// Format a dollar amount with comma thousands separators.
pub fn format_dollars(amount: f64) -> String {
    let whole = amount.abs() as u64;
    let sign = if amount < 0.0 { "-" } else { "" };

    if whole < 1_000 {
        return format!("{}{}", sign, whole);
    }

    let s = whole.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    format!("{}{}", sign, result.chars().rev().collect::<String>())
}

fn list_lines<F>(customers: &[ContextCustomer], line: F) -> String
where
    F: Fn(&ContextCustomer) -> String,
{
    customers
        .iter()
        .map(|c| format!("- {}", line(c)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Synthesize an answer purely from store-query results.
pub fn deterministic_answer(context: &CompactContext) -> String {
    match context.intent {
        QueryIntent::ChurnRisk => {
            if context.customers.is_empty() {
                "No customers currently exceed the churn risk threshold. \
                 Your customer base looks stable."
                    .to_string()
            } else {
                format!(
                    "{} of your {} customers are at elevated churn risk:\n{}",
                    context.customers.len(),
                    context.total_customers,
                    list_lines(&context.customers, |c| {
                        format!(
                            "{} ({:.0}% churn probability, {} risk)",
                            c.company_name,
                            c.churn_probability * 100.0,
                            c.risk_level
                        )
                    })
                )
            }
        }
        QueryIntent::HighValue => {
            if context.customers.is_empty() {
                "No customers cross the high-value spend threshold yet.".to_string()
            } else {
                format!(
                    "Your highest-value customers:\n{}",
                    list_lines(&context.customers, |c| {
                        format!(
                            "{} (${} lifetime spend, {} segment)",
                            c.company_name,
                            format_dollars(c.total_spent),
                            c.segment
                        )
                    })
                )
            }
        }
        QueryIntent::Upsell => {
            if context.customers.is_empty() {
                "No strong upsell opportunities right now. Engagement may \
                 need to grow before expansion conversations make sense."
                    .to_string()
            } else {
                format!(
                    "{} upsell opportunities stand out:\n{}",
                    context.customers.len(),
                    list_lines(&context.customers, |c| {
                        format!(
                            "{} (upsell score {:.2}, ${} current spend)",
                            c.company_name,
                            c.upsell_score,
                            format_dollars(c.total_spent)
                        )
                    })
                )
            }
        }
        QueryIntent::Segments => {
            if context.segments.is_empty() {
                "No segment data yet — upload customer records to see the \
                 breakdown."
                    .to_string()
            } else {
                let lines: Vec<String> = context
                    .segments
                    .iter()
                    .map(|s| {
                        format!(
                            "- {}: {} customers, ${} revenue, avg engagement {:.0}",
                            s.segment,
                            s.count,
                            format_dollars(s.revenue),
                            s.avg_engagement
                        )
                    })
                    .collect();
                format!(
                    "Your {} customers across {} segments:\n{}",
                    context.total_customers,
                    context.segments.len(),
                    lines.join("\n")
                )
            }
        }
        QueryIntent::General => {
            if context.total_customers == 0 {
                CAPABILITY_STATEMENT.to_string()
            } else {
                format!(
                    "You have {} customers generating ${} in total revenue, \
                     with average engagement of {:.0}. {}",
                    context.total_customers,
                    format_dollars(context.metrics.total_revenue),
                    context.metrics.average_engagement,
                    CAPABILITY_STATEMENT
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_pipeline::record_store::AggregateMetrics;
    use pulse_scoring::{RiskLevel, Segment};

    fn customer(name: &str, churn: f64, spend: f64) -> ContextCustomer {
        ContextCustomer {
            company_name: name.to_string(),
            segment: Segment::Standard,
            risk_level: RiskLevel::High,
            churn_probability: churn,
            upsell_score: 0.6,
            total_spent: spend,
            engagement_score: 40,
        }
    }

    fn context(intent: QueryIntent, customers: Vec<ContextCustomer>) -> CompactContext {
        CompactContext {
            intent,
            total_customers: 10,
            metrics: AggregateMetrics {
                total_customers: 10,
                total_revenue: 123_456.0,
                average_engagement: 55.0,
                churn_rate: 0.2,
                active_customers: 9,
                new_this_month: 1,
            },
            customers,
            sample: Vec::new(),
            top_spenders: Vec::new(),
            segments: Vec::new(),
        }
    }

    #[test]
    fn dollars_format_with_separators() {
        assert_eq!(format_dollars(0.0), "0");
        assert_eq!(format_dollars(999.4), "999");
        assert_eq!(format_dollars(1_234.0), "1,234");
        assert_eq!(format_dollars(1_234_567.0), "1,234,567");
        assert_eq!(format_dollars(-5_000.0), "-5,000");
    }

    #[test]
    fn churn_answer_names_companies_and_percentages() {
        let ctx = context(
            QueryIntent::ChurnRisk,
            vec![customer("Acme", 0.82, 1_000.0)],
        );
        let answer = deterministic_answer(&ctx);
        assert!(answer.contains("Acme"));
        assert!(answer.contains("82% churn probability"));
    }

    #[test]
    fn churn_answer_with_no_risky_customers() {
        let ctx = context(QueryIntent::ChurnRisk, vec![]);
        assert!(deterministic_answer(&ctx).contains("stable"));
    }

    #[test]
    fn high_value_answer_lists_spend() {
        let ctx = context(
            QueryIntent::HighValue,
            vec![customer("BigCo", 0.1, 250_000.0)],
        );
        let answer = deterministic_answer(&ctx);
        assert!(answer.contains("BigCo"));
        assert!(answer.contains("$250,000"));
    }

    #[test]
    fn general_answer_is_capability_statement_when_empty() {
        let mut ctx = context(QueryIntent::General, vec![]);
        ctx.total_customers = 0;
        assert_eq!(deterministic_answer(&ctx), CAPABILITY_STATEMENT);
    }

    #[test]
    fn answers_are_deterministic() {
        let ctx = context(
            QueryIntent::Upsell,
            vec![customer("Acme", 0.1, 9_000.0), customer("Globex", 0.1, 800.0)],
        );
        assert_eq!(deterministic_answer(&ctx), deterministic_answer(&ctx));
    }
}
