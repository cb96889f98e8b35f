//! Column-mapping inference.
//!
//! Maps canonical record fields to arbitrary source-file column names
//! using a fixed synonym table. The mapping is inferred once per batch
//! from the first clean sample row and applied uniformly to every row;
//! it is also stored on the batch so collaborators can preview or
//! correct it.

use std::collections::BTreeMap;

use crate::row_parser::CleanRow;

/// Canonical field -> matched source column.
pub type ColumnMapping = BTreeMap<String, String>;

/// The synonym table: canonical field -> ordered synonym substrings.
/// A source key matches a canonical field when its lowercase form
/// contains any synonym as a substring.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("customer_id", &["customer_id", "customerid", "client_id", "account_id", "id"]),
    (
        "company_name",
        &["company_name", "company", "business", "organization", "account_name"],
    ),
    ("industry", &["industry", "sector", "vertical"]),
    ("location", &["location", "city", "region", "country", "territory"]),
    (
        "total_spent",
        &["total_spent", "total_spend", "revenue", "amount", "value", "lifetime_value"],
    ),
    (
        "engagement_score",
        &["engagement", "activity_score", "interaction_score", "health_score"],
    ),
    (
        "last_interaction_date",
        &["last_interaction", "last_contact", "last_activity", "last_seen", "last_purchase"],
    ),
    (
        "purchase_count",
        &["purchase_count", "purchases", "orders", "order_count", "frequency"],
    ),
    ("support_tickets", &["support_tickets", "tickets", "cases", "complaints"]),
    ("status", &["status", "lifecycle", "active"]),
];

/// Infer the canonical-field mapping from one sample record.
///
/// For each canonical field the first source key — in the record's key
/// iteration order — whose lowercase form contains any synonym wins.
/// Canonical fields with no matching key are simply absent from the
/// mapping.
pub fn infer_mapping(sample: &CleanRow) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    for (field, synonyms) in SYNONYMS {
        for key in sample.keys() {
            let lower = key.to_lowercase();
            if synonyms.iter().any(|syn| lower.contains(syn)) {
                mapping.insert((*field).to_string(), key.clone());
                break;
            }
        }
    }
    mapping
}
