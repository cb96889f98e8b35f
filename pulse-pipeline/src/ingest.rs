//! The ingest orchestrator: file bytes in, enriched records out.
//!
//! Owns every `UploadBatch` mutation. The flow per batch:
//! 1. parse (CSV streaming / JSON whole-buffer)
//! 2. infer the column mapping from the first clean row
//! 3. canonicalize each row with conservative defaults
//! 4. score the batch (remote first, rule model as the floor)
//! 5. overlay remote results onto the locally derived scores
//! 6. append to the user's partition and close out the batch
//!
//! Batches are not atomic. A wholesale parse failure marks the batch
//! `Error`, but per-row problems never abort — they ride along in the
//! batch's error list next to the rows that made it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use pulse_scoring::{fallback, thresholds::SCORE_CAP, CustomerInput, ScoringEngine, ScoringOutcome, Segment};

use crate::canonical::{
    CustomerDraft, CustomerStatus, FileType, RowError, UploadBatch, DEFAULT_ENGAGEMENT, UNKNOWN,
    UNKNOWN_COMPANY,
};
use crate::column_mapper::{infer_mapping, ColumnMapping};
use crate::error::IngestError;
use crate::record_store::RecordStore;
use crate::row_parser::{parse_csv, parse_json, CleanRow, IDENTIFIER_KEYS};

/// What one processing run produced.
#[derive(Debug)]
pub struct IngestReport {
    pub batch_id: String,
    /// Rows canonicalized and stored. Excludes dropped and failed rows.
    pub row_count: usize,
    pub stored_ids: Vec<String>,
    pub errors: Vec<RowError>,
    /// The batch-level scoring outcome (segments, predictions,
    /// opportunities, insights) from whichever backend served it.
    pub outcome: ScoringOutcome,
}

/// Wires the parser, mapper, scoring engine, and record store into the
/// processing step.
pub struct Ingestor<'a> {
    scoring: &'a ScoringEngine,
    store: &'a RecordStore,
}

impl<'a> Ingestor<'a> {
    pub fn new(scoring: &'a ScoringEngine, store: &'a RecordStore) -> Self {
        Self { scoring, store }
    }

    /// Process one upload. The batch must be freshly `Uploaded`; on
    /// return it is `Processed` (possibly with row errors) or `Error`
    /// (wholesale parse failure).
    pub async fn process(
        &self,
        batch: &mut UploadBatch,
        bytes: &[u8],
    ) -> Result<IngestReport, IngestError> {
        batch.begin_processing()?;
        log::info!(
            "processing batch {} ({}, {} bytes) for user {}",
            batch.id,
            batch.original_name,
            bytes.len(),
            batch.user_id
        );

        let (rows, errors) = match self.parse(batch.file_type, bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                batch.fail(vec![RowError {
                    row_index: 0,
                    message: err.to_string(),
                    raw_row: String::new(),
                }])?;
                return Err(err);
            }
        };

        // The mapping comes from the first clean row and applies to all.
        let mapping = rows.first().map(infer_mapping).unwrap_or_default();
        batch.column_mapping = Some(mapping.clone());

        let now = Utc::now();
        let mut drafts = Vec::with_capacity(rows.len());
        let mut inputs = Vec::with_capacity(rows.len());
        for row in &rows {
            let (draft, input) = canonicalize(row, &mapping, now);
            drafts.push(draft);
            inputs.push(input);
        }

        let outcome = self.scoring.score(&batch.user_id, &inputs).await;
        overlay_scores(&mut drafts, &outcome);

        let stored_ids = self.store.append(&batch.user_id, &batch.id, drafts);
        let row_count = stored_ids.len();
        batch.finish(row_count, errors.clone())?;
        log::info!(
            "batch {} processed: {} rows stored, {} row errors",
            batch.id,
            row_count,
            errors.len()
        );

        Ok(IngestReport {
            batch_id: batch.id.clone(),
            row_count,
            stored_ids,
            errors,
            outcome,
        })
    }

    fn parse(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<(Vec<CleanRow>, Vec<RowError>), IngestError> {
        match file_type {
            FileType::Csv => {
                let mut stream = parse_csv(bytes)?;
                let rows: Vec<CleanRow> = (&mut stream).collect();
                Ok((rows, stream.take_errors()))
            }
            FileType::Json => {
                let parsed = parse_json(bytes)?;
                Ok((parsed.rows, parsed.errors))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

fn mapped<'r>(row: &'r CleanRow, mapping: &ColumnMapping, field: &str) -> Option<&'r Value> {
    mapping.get(field).and_then(|key| row.get(key))
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    value_f64(value).map(|f| f.round() as i64)
}

/// Lenient timestamp parsing for source data: RFC 3339, then common
/// date and date-time layouts. Unparseable dates read as absent, which
/// the scorer treats as very stale.
fn value_date(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value_string(value)?;
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    for layout in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// The identifier: the mapped customer-id column, or any of the bare
/// identifier keys the parser guaranteed to exist.
fn resolve_customer_id(row: &CleanRow, mapping: &ColumnMapping) -> String {
    if let Some(id) = mapped(row, mapping, "customer_id").and_then(value_string) {
        return id;
    }
    IDENTIFIER_KEYS
        .iter()
        .find_map(|key| row.get(*key).and_then(value_string))
        .unwrap_or_default()
}

/// Canonicalize one clean row into a scored draft plus the scoring
/// input. Missing fields take the documented defaults; engagement is
/// clamped to [0, 100]; spend and counts are floored at zero.
fn canonicalize(
    row: &CleanRow,
    mapping: &ColumnMapping,
    now: DateTime<Utc>,
) -> (CustomerDraft, CustomerInput) {
    let customer_id = resolve_customer_id(row, mapping);
    let company_name = mapped(row, mapping, "company_name")
        .and_then(value_string)
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let industry = mapped(row, mapping, "industry")
        .and_then(value_string)
        .unwrap_or_else(|| UNKNOWN.to_string());
    let location = mapped(row, mapping, "location")
        .and_then(value_string)
        .unwrap_or_else(|| UNKNOWN.to_string());
    let total_spent = mapped(row, mapping, "total_spent")
        .and_then(value_f64)
        .unwrap_or(0.0)
        .max(0.0);
    let engagement_score = mapped(row, mapping, "engagement_score")
        .and_then(value_i64)
        .unwrap_or(DEFAULT_ENGAGEMENT)
        .clamp(0, 100);
    let last_interaction_date = mapped(row, mapping, "last_interaction_date").and_then(value_date);
    let purchase_count = mapped(row, mapping, "purchase_count")
        .and_then(value_i64)
        .unwrap_or(0)
        .max(0) as u32;
    let support_tickets = mapped(row, mapping, "support_tickets")
        .and_then(value_i64)
        .unwrap_or(0)
        .max(0) as u32;
    let status = mapped(row, mapping, "status")
        .and_then(value_string)
        .map(|s| CustomerStatus::parse(&s))
        .unwrap_or_default();

    let input = CustomerInput {
        customer_id: customer_id.clone(),
        company_name: company_name.clone(),
        total_spent,
        engagement_score,
        last_interaction_date,
        purchase_count,
        support_tickets,
    };
    let scores = fallback::score_customer(&input, now);

    let draft = CustomerDraft {
        customer_id,
        company_name,
        industry,
        location,
        total_spent,
        engagement_score,
        last_interaction_date,
        purchase_count,
        support_tickets,
        status,
        segment: scores.segment,
        churn_probability: scores.churn_probability,
        upsell_score: scores.upsell_score,
        risk_level: scores.risk_level,
        raw_data: row.clone(),
    };
    (draft, input)
}

/// Overlay batch scoring results onto the locally derived draft scores,
/// matching by customer id. Customers the outcome does not cover keep
/// their fallback scores; risk level is always re-derived from the
/// final churn probability so it stays consistent with it.
fn overlay_scores(drafts: &mut [CustomerDraft], outcome: &ScoringOutcome) {
    let churn_by_id: HashMap<&str, f64> = outcome
        .churn_predictions
        .iter()
        .map(|p| (p.customer_id.as_str(), p.churn_probability))
        .collect();
    let upsell_by_id: HashMap<&str, f64> = outcome
        .upsell_opportunities
        .iter()
        .map(|u| (u.customer_id.as_str(), u.upsell_score))
        .collect();
    let mut segment_by_id: HashMap<&str, Segment> = HashMap::new();
    for summary in &outcome.segments {
        if let Some(segment) = Segment::parse(&summary.name) {
            for customer_id in &summary.customers {
                segment_by_id.insert(customer_id.as_str(), segment);
            }
        }
    }

    for draft in drafts {
        if let Some(churn) = churn_by_id.get(draft.customer_id.as_str()) {
            draft.churn_probability = churn.clamp(0.0, SCORE_CAP);
        }
        if let Some(upsell) = upsell_by_id.get(draft.customer_id.as_str()) {
            draft.upsell_score = upsell.clamp(0.0, SCORE_CAP);
        }
        if let Some(segment) = segment_by_id.get(draft.customer_id.as_str()) {
            draft.segment = *segment;
        }
        draft.risk_level = fallback::risk_level(draft.churn_probability, draft.engagement_score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(pairs: &[(&str, Value)]) -> CleanRow {
        let mut row = CleanRow::new();
        for (k, v) in pairs {
            row.insert((*k).to_string(), v.clone());
        }
        row
    }

    #[test]
    fn canonicalize_applies_defaults() {
        let row = clean(&[("customer_id", Value::from("c1"))]);
        let mapping = infer_mapping(&row);
        let (draft, input) = canonicalize(&row, &mapping, Utc::now());
        assert_eq!(draft.company_name, UNKNOWN_COMPANY);
        assert_eq!(draft.industry, UNKNOWN);
        assert_eq!(draft.location, UNKNOWN);
        assert_eq!(draft.total_spent, 0.0);
        assert_eq!(draft.engagement_score, DEFAULT_ENGAGEMENT);
        assert_eq!(draft.purchase_count, 0);
        assert_eq!(draft.status, CustomerStatus::Active);
        assert!(input.last_interaction_date.is_none());
    }

    #[test]
    fn canonicalize_clamps_engagement() {
        let row = clean(&[
            ("customer_id", Value::from("c1")),
            ("engagement_score", Value::from(250)),
        ]);
        let mapping = infer_mapping(&row);
        let (draft, _) = canonicalize(&row, &mapping, Utc::now());
        assert_eq!(draft.engagement_score, 100);
    }

    #[test]
    fn canonicalize_floors_negative_spend() {
        let row = clean(&[
            ("customer_id", Value::from("c1")),
            ("revenue", Value::from(-500.0)),
        ]);
        let mapping = infer_mapping(&row);
        let (draft, _) = canonicalize(&row, &mapping, Utc::now());
        assert_eq!(draft.total_spent, 0.0);
    }

    #[test]
    fn date_layouts_parse() {
        assert!(value_date(&Value::from("2026-01-15")).is_some());
        assert!(value_date(&Value::from("2026-01-15 08:30:00")).is_some());
        assert!(value_date(&Value::from("2026-01-15T08:30:00Z")).is_some());
        assert!(value_date(&Value::from("01/15/2026")).is_some());
        assert!(value_date(&Value::from("not a date")).is_none());
    }

    #[test]
    fn overlay_keeps_fallback_when_remote_is_sparse() {
        let row = clean(&[
            ("customer_id", Value::from("c1")),
            ("revenue", Value::from(60_000)),
            ("engagement", Value::from(90)),
        ]);
        let mapping = infer_mapping(&row);
        let (draft, _) = canonicalize(&row, &mapping, Utc::now());
        let mut drafts = vec![draft];
        // Remote outcome covering a different customer entirely.
        let outcome = ScoringOutcome {
            churn_predictions: vec![],
            ..Default::default()
        };
        let before = drafts[0].clone();
        overlay_scores(&mut drafts, &outcome);
        assert_eq!(drafts[0].churn_probability, before.churn_probability);
        assert_eq!(drafts[0].segment, before.segment);
    }

    #[test]
    fn overlay_applies_remote_churn_and_rederives_risk() {
        let row = clean(&[
            ("customer_id", Value::from("c1")),
            ("engagement", Value::from(90)),
        ]);
        let mapping = infer_mapping(&row);
        let (draft, _) = canonicalize(&row, &mapping, Utc::now());
        let mut drafts = vec![draft];
        let outcome = ScoringOutcome {
            churn_predictions: vec![pulse_scoring::ChurnPrediction {
                customer_id: "c1".into(),
                company_name: String::new(),
                churn_probability: 0.99, // over the cap: clamped
                risk_level: "whatever".into(),
                key_factors: vec![],
                recommended_action: String::new(),
            }],
            ..Default::default()
        };
        overlay_scores(&mut drafts, &outcome);
        assert_eq!(drafts[0].churn_probability, SCORE_CAP);
        // churn 0.95 > 0.7 -> Critical regardless of engagement
        assert_eq!(drafts[0].risk_level, pulse_scoring::RiskLevel::Critical);
    }
}
