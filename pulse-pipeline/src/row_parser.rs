//! Row parsing and cleaning for CSV and JSON uploads.
//!
//! Cleaning rules, applied per row:
//! - keys are lowercased and sanitized (anything outside `[a-z0-9_]`
//!   becomes `_`)
//! - numeric-looking strings are coerced to JSON numbers
//! - string values are trimmed
//! - null values are dropped
//!
//! A row with none of `customer_id` / `id` / `customerid` after
//! sanitization is dropped silently — that is a content filter, not a
//! parse failure, so it produces no `RowError`. Malformed rows (bad
//! CSV records, non-object JSON elements) are captured as `RowError`s
//! and never abort the scan.
//!
//! CSV is consumed as a streaming, non-restartable sequence; JSON is
//! parsed as one in-memory array and fails fast with a typed error
//! when the top-level value is not an array.

use std::io::Read;

use serde_json::{Map, Value};

use crate::canonical::RowError;
use crate::error::IngestError;

/// A cleaned row: sanitized keys in source order, coerced values.
pub type CleanRow = Map<String, Value>;

/// Keys that qualify a row as identifiable, checked post-sanitization.
pub const IDENTIFIER_KEYS: [&str; 3] = ["customer_id", "id", "customerid"];

/// Lowercase a key and replace anything outside `[a-z0-9_]` with `_`.
pub fn sanitize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Coerce a scalar string: trim, then parse as a number when the whole
/// trimmed value is numeric.
fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::from(int);
        }
        if let Ok(float) = trimmed.parse::<f64>() {
            if float.is_finite() {
                if let Some(num) = serde_json::Number::from_f64(float) {
                    return Value::Number(num);
                }
            }
        }
    }
    Value::String(trimmed.to_string())
}

/// Clean one value. `None` means "drop this key".
fn clean_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(coerce_scalar(&s)),
        other => Some(other),
    }
}

/// Clean a row's entries into a `CleanRow`, or `None` when the row has
/// no usable identifier and must be dropped silently.
pub fn clean_record<I>(entries: I) -> Option<CleanRow>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut row = CleanRow::new();
    for (key, value) in entries {
        let key = sanitize_key(&key);
        if key.is_empty() {
            continue;
        }
        if let Some(value) = clean_value(value) {
            row.insert(key, value);
        }
    }

    let identified = IDENTIFIER_KEYS.iter().any(|key| match row.get(*key) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    });
    identified.then_some(row)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Streaming iterator over the clean rows of a CSV source.
///
/// Unidentifiable rows vanish from the stream; malformed rows are
/// recorded in the error side-channel. Drain the iterator, then call
/// [`CsvRows::take_errors`].
pub struct CsvRows<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    headers: Vec<String>,
    row_index: usize,
    errors: Vec<RowError>,
}

/// Open a CSV byte stream. The header row is read eagerly; data rows
/// stream one at a time.
pub fn parse_csv<R: Read>(reader: R) -> Result<CsvRows<R>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    Ok(CsvRows {
        records: csv_reader.into_records(),
        headers,
        row_index: 0,
        errors: Vec::new(),
    })
}

impl<R: Read> CsvRows<R> {
    /// Errors collected so far.
    pub fn errors(&self) -> &[RowError] {
        &self.errors
    }

    /// Consume the collected row errors after the stream is drained.
    pub fn take_errors(&mut self) -> Vec<RowError> {
        std::mem::take(&mut self.errors)
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = CleanRow;

    fn next(&mut self) -> Option<CleanRow> {
        loop {
            let index = self.row_index;
            match self.records.next()? {
                Err(err) => {
                    self.row_index += 1;
                    self.errors.push(RowError {
                        row_index: index,
                        message: format!("CSV parse error at data row {}: {}", index, err),
                        raw_row: String::new(),
                    });
                }
                Ok(record) => {
                    self.row_index += 1;
                    let entries = self
                        .headers
                        .iter()
                        .zip(record.iter())
                        .map(|(h, v)| (h.clone(), Value::String(v.to_string())));
                    if let Some(row) = clean_record(entries) {
                        return Some(row);
                    }
                    // No identifier: dropped silently, not an error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Result of parsing a JSON upload.
#[derive(Debug)]
pub struct ParsedRows {
    pub rows: Vec<CleanRow>,
    pub errors: Vec<RowError>,
}

/// Parse a JSON upload. The top-level value must be an array; anything
/// else is a typed, fail-fast error. Array elements that are not
/// objects become `RowError`s.
pub fn parse_json(bytes: &[u8]) -> Result<ParsedRows, IngestError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(IngestError::NotAnArray);
    };

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => {
                if let Some(row) = clean_record(map) {
                    rows.push(row);
                }
            }
            other => errors.push(RowError {
                row_index: index,
                message: "row is not a JSON object".to_string(),
                raw_row: other.to_string(),
            }),
        }
    }
    Ok(ParsedRows { rows, errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Customer ID,Company,Revenue,Engagement Score
c-1,Acme Corp,60000,90
c-2,Globex,  1200.50 ,45
,NoIdCo,100,50
";

    #[test]
    fn sanitize_key_rules() {
        assert_eq!(sanitize_key("Customer ID"), "customer_id");
        assert_eq!(sanitize_key("Total-Spent ($)"), "total_spent____");
        assert_eq!(sanitize_key("engagement_score"), "engagement_score");
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let row = clean_record(vec![
            ("id".to_string(), Value::String("c-1".into())),
            ("Revenue".to_string(), Value::String("60000".into())),
            ("Score".to_string(), Value::String(" 12.5 ".into())),
            ("Name".to_string(), Value::String("  Acme  ".into())),
        ])
        .unwrap();
        assert_eq!(row["revenue"], Value::from(60000));
        assert_eq!(row["score"], Value::from(12.5));
        assert_eq!(row["name"], Value::from("Acme"));
    }

    #[test]
    fn null_values_are_dropped() {
        let row = clean_record(vec![
            ("id".to_string(), Value::String("c-1".into())),
            ("industry".to_string(), Value::Null),
        ])
        .unwrap();
        assert!(!row.contains_key("industry"));
    }

    #[test]
    fn unidentifiable_row_is_dropped_silently() {
        assert!(clean_record(vec![(
            "total_spent".to_string(),
            Value::String("100".into())
        )])
        .is_none());
        // Empty identifier counts as missing.
        assert!(clean_record(vec![(
            "customer_id".to_string(),
            Value::String("  ".into())
        )])
        .is_none());
    }

    #[test]
    fn csv_stream_drops_unidentified_without_error() {
        let mut rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let cleaned: Vec<CleanRow> = (&mut rows).collect();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0]["customer_id"], Value::from("c-1"));
        assert_eq!(cleaned[0]["revenue"], Value::from(60000));
        assert_eq!(cleaned[1]["revenue"], Value::from(1200.5));
        // The NoIdCo row is gone and left no trace in the errors.
        assert!(rows.take_errors().is_empty());
    }

    #[test]
    fn csv_keys_keep_source_order() {
        let mut rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let first = rows.next().unwrap();
        let keys: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["customer_id", "company", "revenue", "engagement_score"]
        );
    }

    #[test]
    fn json_top_level_must_be_array() {
        let err = parse_json(br#"{"customer_id": "c1"}"#).unwrap_err();
        assert!(matches!(err, IngestError::NotAnArray));
    }

    #[test]
    fn json_rows_are_cleaned_and_filtered() {
        let parsed = parse_json(
            br#"[
                {"Customer ID": "c1", "Revenue": "500", "Industry": null},
                {"total_spent": 100},
                "not an object"
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0]["revenue"], Value::from(500));
        assert!(!parsed.rows[0].contains_key("industry"));
        // One structural error (the string), none for the id-less row.
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].row_index, 2);
    }

    #[test]
    fn json_garbage_fails_fast() {
        assert!(parse_json(b"not json").is_err());
    }
}
