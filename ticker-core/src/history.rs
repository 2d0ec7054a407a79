//! Bounded history log.
//!
//! The log mirrors the remote history store: newest records first, capped at
//! a configurable size, with each record tagged by where it was durably
//! accepted. Eviction happens at insertion time from the tail (the oldest
//! records), so the newest record is never the one dropped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::FormState;
use crate::store::now_ms;

/// Where a committed record was durably accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Accepted by the remote history service.
    Remote,
    /// Persisted locally only (no identity, or the remote write failed).
    LocalOnly,
}

/// A generated ticket kept in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Client-generated id, stable across remote-write retries.
    pub id: String,
    /// Style the ticket was generated with.
    pub style: String,
    /// Form contents at generation time.
    pub form: FormState,
    /// Rendered preview as base64 PNG, when one was kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_base64: Option<String>,
    /// Generation time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Where the record was durably accepted.
    #[serde(default = "RecordOrigin::local_only")]
    pub origin: RecordOrigin,
}

impl RecordOrigin {
    const fn local_only() -> Self {
        Self::LocalOnly
    }
}

impl HistoryRecord {
    /// New record with a fresh id and the current timestamp, starting as
    /// [`RecordOrigin::LocalOnly`] until a remote write succeeds.
    #[must_use]
    pub fn new(style: impl Into<String>, form: FormState, preview_base64: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            style: style.into(),
            form,
            preview_base64,
            timestamp_ms: now_ms(),
            origin: RecordOrigin::LocalOnly,
        }
    }
}

/// Sort order for displaying history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Timestamp descending (the default view).
    #[default]
    NewestFirst,
    /// Timestamp ascending.
    OldestFirst,
}

/// Newest-first record list, capped at `cap` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
    cap: usize,
}

impl HistoryLog {
    /// Empty log holding at most `cap` records (minimum 1).
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            cap: cap.max(1),
        }
    }

    /// Insert at the head, evicting from the tail beyond the cap.
    pub fn insert(&mut self, record: HistoryRecord) {
        self.records.insert(0, record);
        self.records.truncate(self.cap);
    }

    /// Replace the whole log with `records`, newest first, enforcing the cap.
    pub fn replace_all(&mut self, mut records: Vec<HistoryRecord>) {
        records.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        records.truncate(self.cap);
        self.records = records;
    }

    /// Remove the record with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.records.len() != before
    }

    /// Remove every record whose id is in `ids`. Returns the removed count.
    pub fn remove_many(&mut self, ids: &[String]) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !ids.contains(&record.id));
        before - self.records.len()
    }

    /// Remove all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Record with `id`, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Records in stored (newest-first) order.
    #[must_use]
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Records sorted for display. The sort is stable, so records sharing a
    /// timestamp keep their insertion order.
    #[must_use]
    pub fn sorted(&self, order: SortOrder) -> Vec<HistoryRecord> {
        let mut records = self.records.clone();
        match order {
            SortOrder::NewestFirst => {
                records.sort_by_key(|record| std::cmp::Reverse(record.timestamp_ms));
            }
            SortOrder::OldestFirst => records.sort_by_key(|record| record.timestamp_ms),
        }
        records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Configured maximum size.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Change the cap, evicting tail records if the log is now too large.
    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        self.records.truncate(self.cap);
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(crate::config::CoreConfig::default().history_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: u64) -> HistoryRecord {
        let mut record = HistoryRecord::new("red15", FormState::default(), None);
        record.timestamp_ms = ts;
        record
    }

    #[test]
    fn test_insert_newest_first() {
        let mut log = HistoryLog::new(10);
        log.insert(record(1));
        log.insert(record(2));
        assert_eq!(log.records()[0].timestamp_ms, 2);
        assert_eq!(log.records()[1].timestamp_ms, 1);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut log = HistoryLog::new(3);
        for ts in 1..=5 {
            log.insert(record(ts));
        }
        assert_eq!(log.len(), 3);
        let stamps: Vec<u64> = log.records().iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![5, 4, 3]);
    }

    #[test]
    fn test_cap_minimum_is_one() {
        let mut log = HistoryLog::new(0);
        log.insert(record(1));
        log.insert(record(2));
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].timestamp_ms, 2);
    }

    #[test]
    fn test_remove_by_id() {
        let mut log = HistoryLog::new(10);
        let target = record(1);
        let id = target.id.clone();
        log.insert(target);
        log.insert(record(2));

        assert!(log.remove(&id));
        assert!(!log.remove(&id));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_remove_many() {
        let mut log = HistoryLog::new(10);
        let a = record(1);
        let b = record(2);
        let ids = vec![a.id.clone(), b.id.clone(), "missing".to_string()];
        log.insert(a);
        log.insert(b);
        log.insert(record(3));

        assert_eq!(log.remove_many(&ids), 2);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_replace_all_sorts_and_caps() {
        let mut log = HistoryLog::new(2);
        log.insert(record(99));
        log.replace_all(vec![record(1), record(3), record(2)]);
        let stamps: Vec<u64> = log.records().iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![3, 2]);
    }

    #[test]
    fn test_sorted_orders() {
        let mut log = HistoryLog::new(10);
        log.insert(record(2));
        log.insert(record(1));
        log.insert(record(3));

        let newest: Vec<u64> = log
            .sorted(SortOrder::NewestFirst)
            .iter()
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(newest, vec![3, 2, 1]);

        let oldest: Vec<u64> = log
            .sorted(SortOrder::OldestFirst)
            .iter()
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(oldest, vec![1, 2, 3]);
    }

    #[test]
    fn test_sorted_stable_on_ties() {
        let mut log = HistoryLog::new(10);
        let first = record(5);
        let second = record(5);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        log.insert(first);
        log.insert(second);

        let sorted = log.sorted(SortOrder::NewestFirst);
        // Stored order is [second, first]; the stable sort keeps it.
        assert_eq!(sorted[0].id, second_id);
        assert_eq!(sorted[1].id, first_id);
    }

    #[test]
    fn test_set_cap_truncates() {
        let mut log = HistoryLog::new(10);
        for ts in 1..=5 {
            log.insert(record(ts));
        }
        log.set_cap(2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.records()[0].timestamp_ms, 5);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut log = HistoryLog::new(5);
        log.insert(record(7));
        let json = serde_json::to_string(&log).expect("serialize");
        let back: HistoryLog = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, log);
    }
}
