//! In-memory record store.
//!
//! The store owns the ordered collection of records and is the only place
//! records are created. It keeps records sorted by timestamp ascending and
//! guarantees id uniqueness. Persisting the contents is left to the host.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{NotFoundError, ValidationError};
use crate::record::{Clock, Record, RecordDraft, RecordId, SystemClock, Timestamp};
use crate::transfer::MergedResult;
use crate::validation::{validate_candidate, FirstOfDayRules};

/// Ordered, validated collection of driving-log records.
#[derive(Debug)]
pub struct RecordStore {
    /// Records sorted by timestamp ascending.
    records: Vec<Record>,
    /// Next sequential id to hand out.
    next_id: u64,
    /// Mandatory-field rules for the first record of a day.
    rules: FirstOfDayRules,
    /// Source of creation timestamps.
    clock: Box<dyn Clock>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(FirstOfDayRules::default())
    }
}

impl RecordStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new(rules: FirstOfDayRules) -> Self {
        Self::with_clock(rules, Box::new(SystemClock))
    }

    /// Create an empty store with an explicit clock.
    #[must_use]
    pub fn with_clock(rules: FirstOfDayRules, clock: Box<dyn Clock>) -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            rules,
            clock,
        }
    }

    /// Rebuild a store from host-supplied contents.
    ///
    /// Records are sorted, duplicate ids after the first are dropped, and the
    /// id watermark is raised above every sequential id present.
    #[must_use]
    pub fn restore(
        records: Vec<Record>,
        next_id: u64,
        rules: FirstOfDayRules,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut store = Self::with_clock(rules, clock);
        store.next_id = next_id.max(1);
        store.install(records);
        debug!(
            "Restored {} records, next id {}",
            store.records.len(),
            store.next_id
        );
        store
    }

    /// Validate a draft and, on success, insert it as a new record.
    ///
    /// # Errors
    ///
    /// Returns the validation failure, or [`ValidationError::IdsExhausted`]
    /// once the watermark reaches `u64::MAX`. The store is unchanged in both
    /// cases.
    pub fn add(&mut self, draft: &RecordDraft) -> Result<Record, ValidationError> {
        let valid = validate_candidate(&self.records, draft, &self.rules, self.clock.now())?;
        // `u64::MAX` is never handed out, so a saturated watermark cannot collide.
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or(ValidationError::IdsExhausted)?;

        let record = Record {
            id: RecordId::Seq(self.next_id),
            timestamp: valid.timestamp,
            mileage: valid.mileage,
            destination: valid.destination,
            alcohol_check: valid.alcohol_check,
            fuel_record: valid.fuel_record,
        };
        self.next_id = next_id;

        let at = self
            .records
            .partition_point(|r| r.timestamp <= record.timestamp);
        self.records.insert(at, record.clone());
        debug!("Added record {} at position {}", record.id, at);
        Ok(record)
    }

    /// Remove a record by id, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if no record has that id.
    pub fn remove(&mut self, id: &RecordId) -> Result<Record, NotFoundError> {
        let pos = self
            .records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| NotFoundError { id: id.clone() })?;
        let record = self.records.remove(pos);
        debug!("Removed record {}", record.id);
        Ok(record)
    }

    /// Remove every record. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        let count = self.records.len();
        self.records.clear();
        info!("Cleared {} records", count);
    }

    /// All records, timestamp ascending.
    #[must_use]
    pub fn all(&self) -> &[Record] {
        &self.records
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The id the next added record will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Active first-of-day rules.
    #[must_use]
    pub fn rules(&self) -> &FirstOfDayRules {
        &self.rules
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Replace the contents with a merge result.
    pub fn adopt(&mut self, merged: MergedResult) {
        self.next_id = self.next_id.max(merged.next_id);
        self.install(merged.records);
    }

    /// Sort, drop duplicate ids, and reconcile the id watermark.
    fn install(&mut self, mut records: Vec<Record>) {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let mut seen = HashSet::new();
        records.retain(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                warn!("Dropping record with duplicate id {}", r.id);
            }
            fresh
        });

        if let Some(max) = records.iter().filter_map(|r| r.id.as_seq()).max() {
            self.next_id = self.next_id.max(max.saturating_add(1));
        }
        self.records = records;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{record, ts};
    use crate::record::FixedClock;

    const NOW: &str = "2025-06-02T14:00:00+09:00";

    fn create_test_store() -> RecordStore {
        RecordStore::with_clock(FirstOfDayRules::default(), Box::new(FixedClock(ts(NOW))))
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut store = create_test_store();
        let a = store.add(&RecordDraft::new("Home").mileage("100")).unwrap();
        let b = store.add(&RecordDraft::new("Office")).unwrap();

        assert_eq!(a.id, RecordId::Seq(1));
        assert_eq!(b.id, RecordId::Seq(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_add_uses_clock_when_no_timestamp() {
        let mut store = create_test_store();
        let rec = store.add(&RecordDraft::new("Home").mileage("1")).unwrap();
        assert_eq!(rec.timestamp, ts(NOW));
    }

    #[test]
    fn test_add_rejected_leaves_store_unchanged() {
        let mut store = create_test_store();
        let err = store.add(&RecordDraft::new("Station A")).unwrap_err();

        assert_eq!(err, ValidationError::MissingMileage);
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn test_add_keeps_timestamp_order() {
        let mut store = create_test_store();
        store
            .add(
                &RecordDraft::new("Late")
                    .mileage("3")
                    .at(ts("2025-06-03T18:00:00+09:00")),
            )
            .unwrap();
        store
            .add(
                &RecordDraft::new("Early")
                    .mileage("1")
                    .at(ts("2025-06-01T08:00:00+09:00")),
            )
            .unwrap();
        store
            .add(
                &RecordDraft::new("Middle")
                    .mileage("2")
                    .at(ts("2025-06-02T12:00:00+09:00")),
            )
            .unwrap();

        let names: Vec<_> = store.all().iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(names, vec!["Early", "Middle", "Late"]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let mut store = create_test_store();
        store.add(&RecordDraft::new("First").mileage("1")).unwrap();
        store.add(&RecordDraft::new("Second")).unwrap();

        let names: Vec<_> = store.all().iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_first_of_day_is_recomputed_after_remove() {
        let mut store = create_test_store();
        let first = store.add(&RecordDraft::new("Home").mileage("100")).unwrap();
        store.add(&RecordDraft::new("Office")).unwrap();
        store.remove(&first.id).unwrap();
        store.remove(&RecordId::Seq(2)).unwrap();

        // The day is empty again, so mileage is mandatory once more.
        let err = store.add(&RecordDraft::new("Shop")).unwrap_err();
        assert_eq!(err, ValidationError::MissingMileage);
    }

    #[test]
    fn test_remove() {
        let mut store = create_test_store();
        let rec = store.add(&RecordDraft::new("Home").mileage("1")).unwrap();

        let removed = store.remove(&rec.id).unwrap();
        assert_eq!(removed, rec);
        assert!(store.get(&rec.id).is_none());
    }

    #[test]
    fn test_remove_nonexistent() {
        let mut store = create_test_store();
        let err = store.remove(&RecordId::Seq(99)).unwrap_err();
        assert_eq!(err.id, RecordId::Seq(99));
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut store = create_test_store();
        let a = store.add(&RecordDraft::new("Home").mileage("1")).unwrap();
        store.remove(&a.id).unwrap();
        let b = store.add(&RecordDraft::new("Home").mileage("1")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_clear() {
        let mut store = create_test_store();
        store.add(&RecordDraft::new("Home").mileage("1")).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_restore_sorts_and_reconciles_watermark() {
        let records = vec![
            record(9, "2025-06-02T09:00:00+09:00", "B", Some(2.0)),
            record(4, "2025-06-01T09:00:00+09:00", "A", Some(1.0)),
        ];
        let store = RecordStore::restore(
            records,
            3,
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        );

        assert_eq!(store.all()[0].destination, "A");
        assert_eq!(store.next_id(), 10);
    }

    #[test]
    fn test_restore_keeps_higher_persisted_watermark() {
        let records = vec![record(2, "2025-06-01T09:00:00+09:00", "A", Some(1.0))];
        let store = RecordStore::restore(
            records,
            50,
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        );
        assert_eq!(store.next_id(), 50);
    }

    #[test]
    fn test_add_at_top_of_id_space_is_rejected() {
        let records = vec![record(u64::MAX, "2025-06-01T09:00:00+09:00", "A", Some(1.0))];
        let mut store = RecordStore::restore(
            records,
            1,
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        );
        assert_eq!(store.next_id(), u64::MAX);

        let err = store.add(&RecordDraft::new("B").mileage("1")).unwrap_err();
        assert_eq!(err, ValidationError::IdsExhausted);
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), u64::MAX);
    }

    #[test]
    fn test_add_hands_out_last_free_id_once() {
        let records = vec![record(u64::MAX - 2, "2025-06-01T09:00:00+09:00", "A", Some(1.0))];
        let mut store = RecordStore::restore(
            records,
            1,
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        );

        let last = store.add(&RecordDraft::new("B").mileage("1")).unwrap();
        assert_eq!(last.id, RecordId::Seq(u64::MAX - 1));
        assert_eq!(
            store.add(&RecordDraft::new("C")).unwrap_err(),
            ValidationError::IdsExhausted
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_restore_drops_duplicate_ids() {
        let records = vec![
            record(1, "2025-06-01T09:00:00+09:00", "A", Some(1.0)),
            record(1, "2025-06-01T10:00:00+09:00", "A again", Some(1.0)),
        ];
        let store = RecordStore::restore(
            records,
            1,
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].destination, "A");
    }
}
