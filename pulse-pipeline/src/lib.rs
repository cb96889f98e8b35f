//! Ingestion and persistence for customer uploads.
//!
//! The flow: a raw CSV/JSON upload streams through the row parser
//! (clean keys, coerce values, drop unidentifiable rows), the column
//! mapper infers a canonical-field mapping from the first clean row,
//! the ingest orchestrator canonicalizes every row, scores the batch,
//! and appends the enriched records to the per-user record store.
//!
//! Batches are not atomic: rows stored before a mid-stream failure
//! stay stored, and per-row errors ride alongside the successes.

pub mod canonical;
pub mod column_mapper;
pub mod error;
pub mod ingest;
pub mod record_store;
pub mod row_parser;

pub use canonical::{BatchStatus, CustomerDraft, CustomerRecord, CustomerStatus, FileType, RowError, UploadBatch};
pub use column_mapper::{infer_mapping, ColumnMapping};
pub use error::{IngestError, StoreError};
pub use ingest::{IngestReport, Ingestor};
pub use record_store::{AggregateMetrics, QueryPage, RecordStore, SegmentRollup};
