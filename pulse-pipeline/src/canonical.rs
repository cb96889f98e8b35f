//! The canonical record model and upload-batch lifecycle.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulse_scoring::{RiskLevel, Segment};

use crate::column_mapper::ColumnMapping;
use crate::error::IngestError;

/// Sentinel for a missing company name.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
/// Sentinel for other missing descriptive fields.
pub const UNKNOWN: &str = "Unknown";
/// Engagement assumed when the source data carries none.
pub const DEFAULT_ENGAGEMENT: i64 = 50;

// ---------------------------------------------------------------------------
// Customer records
// ---------------------------------------------------------------------------

/// Lifecycle status carried on the source data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Churned,
}

impl CustomerStatus {
    /// Lenient parse from source-data strings; anything unrecognized is
    /// Active.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "inactive" => CustomerStatus::Inactive,
            "churned" => CustomerStatus::Churned,
            _ => CustomerStatus::Active,
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerStatus::Active => write!(f, "Active"),
            CustomerStatus::Inactive => write!(f, "Inactive"),
            CustomerStatus::Churned => write!(f, "Churned"),
        }
    }
}

/// A canonicalized, scored customer row before the store assigns its
/// identity. The store turns drafts into `CustomerRecord`s at append
/// time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub customer_id: String,
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub total_spent: f64,
    pub engagement_score: i64,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub purchase_count: u32,
    pub support_tickets: u32,
    pub status: CustomerStatus,
    pub segment: Segment,
    pub churn_probability: f64,
    pub upsell_score: f64,
    pub risk_level: RiskLevel,
    /// The cleaned source row, retained verbatim for traceability.
    pub raw_data: serde_json::Map<String, serde_json::Value>,
}

/// One enriched customer record as persisted in a user's partition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Store-assigned identifier; immutable.
    pub id: String,
    pub user_id: String,
    /// Source upload batch; used for cascade deletes.
    pub file_id: String,
    pub customer_id: String,
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub total_spent: f64,
    pub engagement_score: i64,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub purchase_count: u32,
    pub support_tickets: u32,
    pub status: CustomerStatus,
    pub segment: Segment,
    pub churn_probability: f64,
    pub upsell_score: f64,
    pub risk_level: RiskLevel,
    pub raw_data: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Row errors
// ---------------------------------------------------------------------------

/// A row that could not be parsed. Collected, never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based index of the row within the upload's data rows.
    pub row_index: usize,
    pub message: String,
    /// The offending raw row, as close to verbatim as the parser had it.
    pub raw_row: String,
}

// ---------------------------------------------------------------------------
// Upload batches
// ---------------------------------------------------------------------------

/// Accepted upload formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
}

impl FileType {
    /// Detect from a file name's extension. Anything but `.csv` /
    /// `.json` is refused at the door.
    pub fn from_name(name: &str) -> Result<Self, IngestError> {
        match Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(FileType::Csv),
            Some("json") => Ok(FileType::Json),
            _ => Err(IngestError::UnsupportedType(name.to_string())),
        }
    }
}

/// Batch state machine: `Uploaded -> Processing -> {Processed | Error}`.
/// The terminal states never transition again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

/// Bookkeeping for one file submission. Created on upload, mutated
/// only by the processing step, deleted together with its records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadBatch {
    pub id: String,
    pub user_id: String,
    pub original_name: String,
    pub size: u64,
    pub file_type: FileType,
    pub status: BatchStatus,
    /// Captured once, from the first clean sample row.
    pub column_mapping: Option<ColumnMapping>,
    pub row_count: usize,
    pub errors: Vec<RowError>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UploadBatch {
    /// Register a new upload. Refuses unsupported file types.
    pub fn new(
        user_id: impl Into<String>,
        original_name: impl Into<String>,
        size: u64,
    ) -> Result<Self, IngestError> {
        let original_name = original_name.into();
        let file_type = FileType::from_name(&original_name)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            original_name,
            size,
            file_type,
            status: BatchStatus::Uploaded,
            column_mapping: None,
            row_count: 0,
            errors: Vec::new(),
            processed_at: None,
            created_at: Utc::now(),
        })
    }

    fn transition(&mut self, to: BatchStatus) -> Result<(), IngestError> {
        let valid = matches!(
            (self.status, to),
            (BatchStatus::Uploaded, BatchStatus::Processing)
                | (BatchStatus::Processing, BatchStatus::Processed)
                | (BatchStatus::Processing, BatchStatus::Error)
        );
        if !valid {
            return Err(IngestError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn begin_processing(&mut self) -> Result<(), IngestError> {
        self.transition(BatchStatus::Processing)
    }

    /// Mark the batch processed with its final row count and error list.
    pub fn finish(&mut self, row_count: usize, errors: Vec<RowError>) -> Result<(), IngestError> {
        self.transition(BatchStatus::Processed)?;
        self.row_count = row_count;
        self.errors = errors;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the batch failed. Rows stored before the failure stay stored.
    pub fn fail(&mut self, errors: Vec<RowError>) -> Result<(), IngestError> {
        self.transition(BatchStatus::Error)?;
        self.errors = errors;
        self.processed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_detection() {
        assert_eq!(FileType::from_name("data.csv").unwrap(), FileType::Csv);
        assert_eq!(FileType::from_name("DATA.JSON").unwrap(), FileType::Json);
        assert!(FileType::from_name("report.xlsx").is_err());
        assert!(FileType::from_name("noextension").is_err());
    }

    #[test]
    fn batch_lifecycle_happy_path() {
        let mut batch = UploadBatch::new("u1", "customers.csv", 42).unwrap();
        assert_eq!(batch.status, BatchStatus::Uploaded);
        batch.begin_processing().unwrap();
        batch.finish(10, vec![]).unwrap();
        assert_eq!(batch.status, BatchStatus::Processed);
        assert_eq!(batch.row_count, 10);
        assert!(batch.processed_at.is_some());
    }

    #[test]
    fn terminal_states_refuse_transitions() {
        let mut batch = UploadBatch::new("u1", "customers.csv", 42).unwrap();
        batch.begin_processing().unwrap();
        batch.fail(vec![]).unwrap();
        assert!(batch.begin_processing().is_err());
        assert!(batch.finish(0, vec![]).is_err());
    }

    #[test]
    fn cannot_finish_before_processing() {
        let mut batch = UploadBatch::new("u1", "customers.json", 1).unwrap();
        assert!(batch.finish(0, vec![]).is_err());
    }

    #[test]
    fn status_parse_is_lenient() {
        assert_eq!(CustomerStatus::parse("CHURNED"), CustomerStatus::Churned);
        assert_eq!(CustomerStatus::parse(" inactive "), CustomerStatus::Inactive);
        assert_eq!(CustomerStatus::parse("whatever"), CustomerStatus::Active);
    }
}
