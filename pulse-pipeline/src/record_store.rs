//! The partitioned customer record store.
//!
//! One partition per `user_id`, each an ordered list of records behind
//! its own lock. Appends are a serialized critical section per
//! partition, so concurrent uploads from different users never contend
//! and concurrent uploads from the same user never lose writes. There
//! is no cross-tenant query surface.
//!
//! Aggregates on an empty partition return fully zeroed structures —
//! an empty CRM is a valid CRM, not an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pulse_scoring::Segment;

use crate::canonical::{CustomerDraft, CustomerRecord, CustomerStatus};
use crate::error::StoreError;

/// Churn probability at or above which a customer counts as churning
/// in the aggregate churn rate.
const CHURN_RATE_FLOOR: f64 = 0.5;

/// One page of query results plus the exact total match count.
#[derive(Clone, Debug, Serialize)]
pub struct QueryPage {
    pub records: Vec<CustomerRecord>,
    /// Total matches across the partition, not just this page.
    pub total: usize,
}

/// Rollup metrics for one partition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_customers: usize,
    pub total_revenue: f64,
    pub average_engagement: f64,
    /// Fraction of customers with churn probability >= 0.5.
    pub churn_rate: f64,
    pub active_customers: usize,
    pub new_this_month: usize,
}

/// Per-segment rollup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentRollup {
    pub segment: Segment,
    pub count: usize,
    pub revenue: f64,
    pub avg_engagement: f64,
}

type Partition = Arc<RwLock<Vec<CustomerRecord>>>;

/// In-memory, per-user partitioned store for enriched customer records.
#[derive(Default)]
pub struct RecordStore {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, user_id: &str) -> Option<Partition> {
        self.partitions.read().get(user_id).cloned()
    }

    fn partition_or_create(&self, user_id: &str) -> Partition {
        let mut partitions = self.partitions.write();
        partitions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone()
    }

    /// Append drafts to a user's partition, assigning each a fresh
    /// identifier and creation timestamp. Returns the assigned ids in
    /// order. The whole append holds the partition's write lock.
    pub fn append(&self, user_id: &str, file_id: &str, drafts: Vec<CustomerDraft>) -> Vec<String> {
        let partition = self.partition_or_create(user_id);
        let mut records = partition.write();
        let created_at = Utc::now();
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = uuid::Uuid::new_v4().to_string();
            ids.push(id.clone());
            records.push(CustomerRecord {
                id,
                user_id: user_id.to_string(),
                file_id: file_id.to_string(),
                customer_id: draft.customer_id,
                company_name: draft.company_name,
                industry: draft.industry,
                location: draft.location,
                total_spent: draft.total_spent,
                engagement_score: draft.engagement_score,
                last_interaction_date: draft.last_interaction_date,
                purchase_count: draft.purchase_count,
                support_tickets: draft.support_tickets,
                status: draft.status,
                segment: draft.segment,
                churn_probability: draft.churn_probability,
                upsell_score: draft.upsell_score,
                risk_level: draft.risk_level,
                raw_data: draft.raw_data,
                created_at,
            });
        }
        log::debug!("appended {} records for user {}", ids.len(), user_id);
        ids
    }

    /// Page through records matching a predicate. `total` counts every
    /// match in the partition, not just the page.
    pub fn query<F>(&self, user_id: &str, predicate: F, limit: usize, offset: usize) -> QueryPage
    where
        F: Fn(&CustomerRecord) -> bool,
    {
        let Some(partition) = self.partition(user_id) else {
            return QueryPage {
                records: Vec::new(),
                total: 0,
            };
        };
        let records = partition.read();
        let matches: Vec<&CustomerRecord> = records.iter().filter(|r| predicate(r)).collect();
        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        QueryPage {
            records: page,
            total,
        }
    }

    /// Fetch one record by store id. Unknown user or id surfaces as a
    /// not-found condition.
    pub fn record(&self, user_id: &str, id: &str) -> Result<CustomerRecord, StoreError> {
        let partition = self
            .partition(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;
        let records = partition.read();
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))
    }

    /// Sorted-descending threshold query over one numeric field.
    fn threshold_query<F>(&self, user_id: &str, limit: usize, score: F) -> Vec<CustomerRecord>
    where
        F: Fn(&CustomerRecord) -> Option<f64>,
    {
        let Some(partition) = self.partition(user_id) else {
            return Vec::new();
        };
        let records = partition.read();
        let mut matches: Vec<(f64, CustomerRecord)> = records
            .iter()
            .filter_map(|r| score(r).map(|s| (s, r.clone())))
            .collect();
        // NaN scores sink to the end so they never surface as top results.
        matches.sort_by(|a, b| match (a.0.is_nan(), b.0.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal),
        });
        matches.truncate(limit);
        matches.into_iter().map(|(_, r)| r).collect()
    }

    /// Customers whose churn probability exceeds the threshold, highest
    /// first.
    pub fn at_risk(&self, user_id: &str, threshold: f64, limit: usize) -> Vec<CustomerRecord> {
        self.threshold_query(user_id, limit, |r| {
            (r.churn_probability > threshold).then_some(r.churn_probability)
        })
    }

    /// Customers whose lifetime spend exceeds the threshold, highest
    /// first.
    pub fn high_value(&self, user_id: &str, threshold: f64, limit: usize) -> Vec<CustomerRecord> {
        self.threshold_query(user_id, limit, |r| {
            (r.total_spent > threshold).then_some(r.total_spent)
        })
    }

    /// The top spenders regardless of threshold, highest first.
    pub fn top_spenders(&self, user_id: &str, limit: usize) -> Vec<CustomerRecord> {
        self.threshold_query(user_id, limit, |r| Some(r.total_spent))
    }

    /// Customers whose upsell score exceeds the threshold, highest
    /// first.
    pub fn upsell(&self, user_id: &str, threshold: f64, limit: usize) -> Vec<CustomerRecord> {
        self.threshold_query(user_id, limit, |r| {
            (r.upsell_score > threshold).then_some(r.upsell_score)
        })
    }

    /// Group-by-segment rollup in fixed segment order. Empty segments
    /// are omitted.
    pub fn segment_rollup(&self, user_id: &str) -> Vec<SegmentRollup> {
        let Some(partition) = self.partition(user_id) else {
            return Vec::new();
        };
        let records = partition.read();
        let mut groups: HashMap<Segment, (usize, f64, f64)> = HashMap::new();
        for record in records.iter() {
            let entry = groups.entry(record.segment).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += record.total_spent;
            entry.2 += record.engagement_score as f64;
        }
        Segment::ALL
            .iter()
            .filter_map(|segment| {
                let (count, revenue, engagement_sum) = groups.get(segment)?;
                Some(SegmentRollup {
                    segment: *segment,
                    count: *count,
                    revenue: *revenue,
                    avg_engagement: engagement_sum / *count as f64,
                })
            })
            .collect()
    }

    /// Partition rollup metrics. A missing or empty partition returns
    /// the zeroed structure.
    pub fn aggregate(&self, user_id: &str) -> AggregateMetrics {
        let Some(partition) = self.partition(user_id) else {
            return AggregateMetrics::default();
        };
        let records = partition.read();
        if records.is_empty() {
            return AggregateMetrics::default();
        }

        let total = records.len();
        let now = Utc::now();
        let churning = records
            .iter()
            .filter(|r| r.churn_probability >= CHURN_RATE_FLOOR)
            .count();
        AggregateMetrics {
            total_customers: total,
            total_revenue: records.iter().map(|r| r.total_spent).sum(),
            average_engagement: records
                .iter()
                .map(|r| r.engagement_score as f64)
                .sum::<f64>()
                / total as f64,
            churn_rate: churning as f64 / total as f64,
            active_customers: records
                .iter()
                .filter(|r| r.status == CustomerStatus::Active)
                .count(),
            new_this_month: records
                .iter()
                .filter(|r| {
                    r.created_at.year() == now.year() && r.created_at.month() == now.month()
                })
                .count(),
        }
    }

    /// Drop an entire user partition. Returns how many records went
    /// with it.
    pub fn delete_user(&self, user_id: &str) -> usize {
        self.partitions
            .write()
            .remove(user_id)
            .map(|p| p.read().len())
            .unwrap_or(0)
    }

    /// Cascade hook: drop every record from one upload batch. Returns
    /// how many records were removed.
    pub fn delete_file(&self, user_id: &str, file_id: &str) -> usize {
        let Some(partition) = self.partition(user_id) else {
            return 0;
        };
        let mut records = partition.write();
        let before = records.len();
        records.retain(|r| r.file_id != file_id);
        before - records.len()
    }

    // -----------------------------------------------------------------
    // Snapshot persistence
    // -----------------------------------------------------------------

    /// Write the full store to a JSON snapshot. I/O failures are fatal
    /// for this operation and surface to the caller.
    pub fn persist_to(&self, path: &Path) -> Result<(), StoreError> {
        let partitions = self.partitions.read();
        let mut snapshot: HashMap<String, Vec<CustomerRecord>> = HashMap::new();
        for (user_id, partition) in partitions.iter() {
            snapshot.insert(user_id.clone(), partition.read().clone());
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a store from a JSON snapshot.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path)?;
        let snapshot: HashMap<String, Vec<CustomerRecord>> = serde_json::from_slice(&bytes)?;
        let store = Self::new();
        {
            let mut partitions = store.partitions.write();
            for (user_id, records) in snapshot {
                partitions.insert(user_id, Arc::new(RwLock::new(records)));
            }
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_scoring::RiskLevel;

    fn draft(customer_id: &str, spend: f64, churn: f64, upsell: f64) -> CustomerDraft {
        CustomerDraft {
            customer_id: customer_id.to_string(),
            company_name: format!("{customer_id} Inc"),
            industry: "Software".into(),
            location: "Unknown".into(),
            total_spent: spend,
            engagement_score: 60,
            last_interaction_date: None,
            purchase_count: 1,
            support_tickets: 0,
            status: CustomerStatus::Active,
            segment: Segment::Standard,
            churn_probability: churn,
            upsell_score: upsell,
            risk_level: RiskLevel::Low,
            raw_data: serde_json::Map::new(),
        }
    }

    #[test]
    fn append_then_query_round_trip() {
        let store = RecordStore::new();
        let drafts = vec![
            draft("c1", 100.0, 0.1, 0.2),
            draft("c2", 200.0, 0.6, 0.7),
            draft("c3", 300.0, 0.8, 0.4),
        ];
        let ids = store.append("u1", "f1", drafts);
        assert_eq!(ids.len(), 3);

        let page = store.query("u1", |_| true, 10, 0);
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 3);
        for (record, id) in page.records.iter().zip(&ids) {
            assert_eq!(&record.id, id);
            assert_eq!(record.user_id, "u1");
            assert_eq!(record.file_id, "f1");
        }
    }

    #[test]
    fn pagination_reports_full_total() {
        let store = RecordStore::new();
        let drafts: Vec<CustomerDraft> = (0..25)
            .map(|i| draft(&format!("c{i}"), i as f64, 0.1, 0.1))
            .collect();
        store.append("u1", "f1", drafts);

        let page = store.query("u1", |_| true, 10, 20);
        assert_eq!(page.total, 25);
        assert_eq!(page.records.len(), 5);
    }

    #[test]
    fn aggregate_on_empty_partition_is_zeroed() {
        let store = RecordStore::new();
        let metrics = store.aggregate("nobody");
        assert_eq!(metrics.total_customers, 0);
        assert_eq!(metrics.total_revenue, 0.0);
        assert_eq!(metrics.average_engagement, 0.0);
        assert_eq!(metrics.churn_rate, 0.0);
        assert_eq!(metrics.active_customers, 0);
        assert_eq!(metrics.new_this_month, 0);
    }

    #[test]
    fn aggregate_counts_churners_at_half() {
        let store = RecordStore::new();
        store.append(
            "u1",
            "f1",
            vec![
                draft("c1", 100.0, 0.5, 0.1),
                draft("c2", 200.0, 0.49, 0.1),
            ],
        );
        let metrics = store.aggregate("u1");
        assert!((metrics.churn_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.new_this_month, 2);
        assert_eq!(metrics.active_customers, 2);
    }

    #[test]
    fn at_risk_is_sorted_descending_and_strict() {
        let store = RecordStore::new();
        store.append(
            "u1",
            "f1",
            vec![
                draft("low", 0.0, 0.3, 0.1),
                draft("mid", 0.0, 0.6, 0.1),
                draft("high", 0.0, 0.9, 0.1),
            ],
        );
        let risky = store.at_risk("u1", 0.3, 10);
        let ids: Vec<&str> = risky.iter().map(|r| r.customer_id.as_str()).collect();
        // 0.3 is not strictly above the threshold.
        assert_eq!(ids, vec!["high", "mid"]);
    }

    #[test]
    fn threshold_queries_respect_limit() {
        let store = RecordStore::new();
        let drafts: Vec<CustomerDraft> = (0..10)
            .map(|i| draft(&format!("c{i}"), (i * 1000) as f64, 0.1, 0.1))
            .collect();
        store.append("u1", "f1", drafts);
        let top = store.high_value("u1", 0.0, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].customer_id, "c9");
    }

    #[test]
    fn segment_rollup_groups_and_averages() {
        let store = RecordStore::new();
        let mut a = draft("a", 60_000.0, 0.1, 0.1);
        a.segment = Segment::HighValue;
        a.engagement_score = 90;
        let mut b = draft("b", 40_000.0, 0.1, 0.1);
        b.segment = Segment::HighValue;
        b.engagement_score = 70;
        let mut c = draft("c", 100.0, 0.1, 0.1);
        c.segment = Segment::AtRisk;
        store.append("u1", "f1", vec![a, b, c]);

        let rollup = store.segment_rollup("u1");
        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup[0].segment, Segment::HighValue);
        assert_eq!(rollup[0].count, 2);
        assert!((rollup[0].revenue - 100_000.0).abs() < 1e-6);
        assert!((rollup[0].avg_engagement - 80.0).abs() < 1e-9);
        assert_eq!(rollup[1].segment, Segment::AtRisk);
    }

    #[test]
    fn delete_file_cascades_only_that_batch() {
        let store = RecordStore::new();
        store.append("u1", "f1", vec![draft("c1", 1.0, 0.1, 0.1)]);
        store.append("u1", "f2", vec![draft("c2", 2.0, 0.1, 0.1)]);
        assert_eq!(store.delete_file("u1", "f1"), 1);
        let page = store.query("u1", |_| true, 10, 0);
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].customer_id, "c2");
    }

    #[test]
    fn delete_user_removes_partition() {
        let store = RecordStore::new();
        store.append("u1", "f1", vec![draft("c1", 1.0, 0.1, 0.1)]);
        assert_eq!(store.delete_user("u1"), 1);
        assert_eq!(store.query("u1", |_| true, 10, 0).total, 0);
        assert_eq!(store.delete_user("u1"), 0);
    }

    #[test]
    fn partitions_are_isolated_per_user() {
        let store = RecordStore::new();
        store.append("u1", "f1", vec![draft("c1", 1.0, 0.9, 0.9)]);
        store.append("u2", "f2", vec![draft("c2", 2.0, 0.9, 0.9)]);
        assert_eq!(store.query("u1", |_| true, 10, 0).total, 1);
        assert_eq!(store.at_risk("u2", 0.5, 10).len(), 1);
        assert_eq!(store.at_risk("u2", 0.5, 10)[0].customer_id, "c2");
    }

    #[test]
    fn record_lookup_not_found_conditions() {
        let store = RecordStore::new();
        assert!(matches!(
            store.record("ghost", "x"),
            Err(StoreError::UnknownUser(_))
        ));
        let ids = store.append("u1", "f1", vec![draft("c1", 1.0, 0.1, 0.1)]);
        assert!(store.record("u1", &ids[0]).is_ok());
        assert!(matches!(
            store.record("u1", "missing"),
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn snapshot_round_trip() {
        let store = RecordStore::new();
        store.append("u1", "f1", vec![draft("c1", 500.0, 0.2, 0.3)]);
        store.append("u2", "f2", vec![draft("c2", 900.0, 0.8, 0.1)]);

        let path = std::env::temp_dir().join(format!("pulse-store-{}.json", std::process::id()));
        store.persist_to(&path).unwrap();
        let loaded = RecordStore::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.query("u1", |_| true, 10, 0).total, 1);
        let record = &loaded.query("u2", |_| true, 10, 0).records[0];
        assert_eq!(record.customer_id, "c2");
        assert!((record.churn_probability - 0.8).abs() < 1e-9);
    }

    #[test]
    fn snapshot_load_surfaces_io_failure() {
        let missing = std::path::Path::new("/nonexistent/pulse-snapshot.json");
        assert!(matches!(
            RecordStore::load_from(missing),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = Arc::new(RecordStore::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store.append(
                        "u1",
                        &format!("f{t}"),
                        vec![draft(&format!("c{t}-{i}"), 1.0, 0.1, 0.1)],
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.query("u1", |_| true, 1000, 0).total, 400);
    }
}
