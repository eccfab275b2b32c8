//! Event-driven facade over the record store.
//!
//! A [`DrivingLog`] is created explicitly by its host and driven with
//! [`Input`] values. Every input yields exactly one [`Event`] describing what
//! happened, which the view layer renders. Destructive actions (clear-all and
//! replace-on-import) are parked as a [`PendingAction`] until the host sends
//! [`Input::Confirm`] or [`Input::Cancel`].

use serde::Serialize;
use tracing::{debug, info};

use crate::datekey::{format_day_label, DayKey, MonthKey};
use crate::error::{NotFoundError, ParseError, ValidationError};
use crate::grouping::{available_months, filter_by_month, group_by_day, Chronology};
use crate::record::{Record, RecordDraft, RecordId, Timestamp};
use crate::store::RecordStore;
use crate::transfer::{
    export_snapshot, merge_imported, parse_import_candidates, suggested_filename, ImportSource,
    MergeOutcome, MergePolicy,
};

/// Something the view layer asks the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Submit a new record.
    Submit(RecordDraft),
    /// Delete a record.
    Delete(RecordId),
    /// Ask to remove every record. Requires confirmation.
    ClearAll,
    /// Change the month filter used by [`DrivingLog::view`].
    SelectMonth(Option<MonthKey>),
    /// Import raw payload text. `Replace` requires confirmation.
    ImportContent {
        /// Payload as read from the source.
        raw: String,
        /// How to combine with existing records.
        policy: MergePolicy,
    },
    /// Produce an export of the whole store.
    Export,
    /// Execute the pending action.
    Confirm,
    /// Discard the pending action.
    Cancel,
}

/// Kind of action waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// Remove every record.
    ClearAll,
    /// Replace the store with an import.
    ReplaceImport,
}

impl std::fmt::Display for PendingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClearAll => write!(f, "clear all records"),
            Self::ReplaceImport => write!(f, "replace all records with import"),
        }
    }
}

/// A destructive action awaiting an explicit yes or no.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Remove every record.
    ClearAll,
    /// Adopt these parsed records as the entire store.
    ReplaceImport {
        /// Parsed import records.
        records: Vec<Record>,
    },
}

impl PendingAction {
    /// What kind of action this is.
    #[must_use]
    pub fn kind(&self) -> PendingKind {
        match self {
            Self::ClearAll => PendingKind::ClearAll,
            Self::ReplaceImport { .. } => PendingKind::ReplaceImport,
        }
    }
}

/// What happened in response to an [`Input`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A record was stored.
    RecordAdded(Record),
    /// A draft was rejected; nothing changed.
    ValidationRejected(ValidationError),
    /// A record was deleted.
    RecordRemoved(RecordId),
    /// Deletion targeted an unknown id; nothing changed.
    NotFound(NotFoundError),
    /// Every record was removed.
    StoreCleared {
        /// How many records were removed.
        removed: usize,
    },
    /// An import was merged into the store.
    ImportMerged {
        /// What the merge did.
        outcome: MergeOutcome,
        /// The policy used.
        policy: MergePolicy,
    },
    /// An import payload was rejected; nothing changed.
    ImportRejected(ParseError),
    /// Export text is ready to be saved.
    ExportReady {
        /// Serialized records.
        contents: String,
        /// Date-stamped file name.
        filename: String,
    },
    /// The store could not be serialized.
    ExportFailed {
        /// Human-readable cause.
        cause: String,
    },
    /// The month filter changed.
    FilterChanged(Option<MonthKey>),
    /// A destructive action is waiting for [`Input::Confirm`].
    ConfirmationRequired(PendingKind),
    /// The pending action was discarded; nothing changed.
    Cancelled(PendingKind),
    /// Confirm or cancel arrived with no pending action.
    NothingPending,
}

/// One day in the display projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayView {
    /// Calendar day.
    pub day: DayKey,
    /// `Today`, `Yesterday`, or a dated weekday label.
    pub label: String,
    /// Sum of the day's mileage readings.
    pub total_mileage: f64,
    /// The day's records in display order.
    pub records: Vec<Record>,
}

/// Display projection of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogView {
    /// Active month filter.
    pub month: Option<MonthKey>,
    /// Number of records passing the filter.
    pub count: usize,
    /// Months that have records, most recent first.
    pub months: Vec<MonthKey>,
    /// Day groups, most recent day first.
    pub days: Vec<DayView>,
}

/// The driving-log engine.
#[derive(Debug)]
pub struct DrivingLog {
    store: RecordStore,
    month: Option<MonthKey>,
    within_day: Chronology,
    pending: Option<PendingAction>,
}

impl DrivingLog {
    /// Wrap a store. Days list their newest record first.
    #[must_use]
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            month: None,
            within_day: Chronology::Descending,
            pending: None,
        }
    }

    /// Choose the order of records within a day in [`DrivingLog::view`].
    #[must_use]
    pub fn with_day_order(mut self, within_day: Chronology) -> Self {
        self.set_day_order(within_day);
        self
    }

    /// Change the order of records within a day.
    pub fn set_day_order(&mut self, within_day: Chronology) {
        self.within_day = within_day;
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The action waiting for confirmation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Active month filter.
    #[must_use]
    pub fn month_filter(&self) -> Option<MonthKey> {
        self.month
    }

    /// Apply one input and report what happened.
    pub fn handle(&mut self, input: Input) -> Event {
        match input {
            Input::Submit(draft) => match self.store.add(&draft) {
                Ok(record) => Event::RecordAdded(record),
                Err(err) => {
                    debug!("Rejected draft: {err}");
                    Event::ValidationRejected(err)
                }
            },
            Input::Delete(id) => match self.store.remove(&id) {
                Ok(record) => Event::RecordRemoved(record.id),
                Err(err) => Event::NotFound(err),
            },
            Input::ClearAll => self.park(PendingAction::ClearAll),
            Input::SelectMonth(month) => {
                self.month = month;
                Event::FilterChanged(month)
            }
            Input::ImportContent { raw, policy } => self.import(&raw, policy),
            Input::Export => self.export(),
            Input::Confirm => self.confirm(),
            Input::Cancel => self.cancel(),
        }
    }

    /// Read content from `source` and import it.
    ///
    /// A read failure is reported as [`Event::ImportRejected`].
    pub async fn import_from(&mut self, source: &dyn ImportSource, policy: MergePolicy) -> Event {
        debug!("Reading import from {}", source.describe());
        match source.read().await {
            Ok(raw) => self.handle(Input::ImportContent { raw, policy }),
            Err(err) => Event::ImportRejected(err),
        }
    }

    /// Build the display projection for the active filter.
    #[must_use]
    pub fn view(&self, reference_now: &Timestamp) -> LogView {
        let filtered = filter_by_month(self.store.all(), self.month);
        let count = filtered.len();
        let days = group_by_day(filtered, self.within_day)
            .into_iter()
            .map(|group| DayView {
                day: group.day,
                label: format_day_label(group.day, reference_now),
                total_mileage: group.total_mileage(),
                records: group.records.into_iter().cloned().collect(),
            })
            .collect();

        LogView {
            month: self.month,
            count,
            months: available_months(self.store.all()),
            days,
        }
    }

    fn import(&mut self, raw: &str, policy: MergePolicy) -> Event {
        let records = match parse_import_candidates(raw) {
            Ok(records) => records,
            Err(err) => return Event::ImportRejected(err),
        };
        match policy {
            MergePolicy::AdditiveDedup => {
                let merged = merge_imported(self.store.all(), records, policy);
                let outcome = merged.outcome;
                self.store.adopt(merged);
                Event::ImportMerged { outcome, policy }
            }
            MergePolicy::Replace => self.park(PendingAction::ReplaceImport { records }),
        }
    }

    fn export(&self) -> Event {
        match export_snapshot(self.store.all()) {
            Ok(contents) => Event::ExportReady {
                contents,
                filename: suggested_filename(&self.store.now()),
            },
            Err(err) => Event::ExportFailed {
                cause: err.to_string(),
            },
        }
    }

    fn park(&mut self, action: PendingAction) -> Event {
        let kind = action.kind();
        if let Some(previous) = self.pending.replace(action) {
            debug!("Replaced pending action: {}", previous.kind());
        }
        Event::ConfirmationRequired(kind)
    }

    fn confirm(&mut self) -> Event {
        let Some(action) = self.pending.take() else {
            return Event::NothingPending;
        };
        match action {
            PendingAction::ClearAll => {
                let removed = self.store.len();
                self.store.clear();
                Event::StoreCleared { removed }
            }
            PendingAction::ReplaceImport { records } => {
                let merged = merge_imported(self.store.all(), records, MergePolicy::Replace);
                let outcome = merged.outcome;
                self.store.adopt(merged);
                info!("Replaced store contents with import");
                Event::ImportMerged {
                    outcome,
                    policy: MergePolicy::Replace,
                }
            }
        }
    }

    fn cancel(&mut self) -> Event {
        match self.pending.take() {
            Some(action) => {
                debug!("Cancelled pending action: {}", action.kind());
                Event::Cancelled(action.kind())
            }
            None => Event::NothingPending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::ts;
    use crate::record::FixedClock;
    use crate::transfer::TextSource;
    use crate::validation::FirstOfDayRules;

    const NOW: &str = "2025-06-02T14:00:00+09:00";

    fn create_test_log() -> DrivingLog {
        DrivingLog::new(RecordStore::with_clock(
            FirstOfDayRules::default(),
            Box::new(FixedClock(ts(NOW))),
        ))
    }

    fn submit(log: &mut DrivingLog, draft: RecordDraft) -> Event {
        log.handle(Input::Submit(draft))
    }

    #[test]
    fn test_scenario_a_first_record_without_mileage() {
        let mut log = create_test_log();
        let event = submit(&mut log, RecordDraft::new("Station A"));

        assert_eq!(
            event,
            Event::ValidationRejected(ValidationError::MissingMileage)
        );
        assert!(log.store().is_empty());
    }

    #[test]
    fn test_scenario_b_second_record_without_mileage() {
        let mut log = create_test_log();
        submit(
            &mut log,
            RecordDraft::new("Home")
                .mileage("100")
                .at(ts("2025-06-02T09:00:00+09:00")),
        );
        let event = submit(
            &mut log,
            RecordDraft::new("Office").at(ts("2025-06-02T14:00:00+09:00")),
        );

        let Event::RecordAdded(record) = event else {
            panic!("expected RecordAdded, got {event:?}");
        };
        assert_eq!(record.destination, "Office");
        assert_eq!(record.mileage, None);
        assert_eq!(log.store().len(), 2);
    }

    #[test]
    fn test_scenario_c_import_colliding_ids() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("Home").mileage("100"));

        let raw = r#"[
            {"id": 1, "timestamp": "2025-06-03T08:00:00+09:00", "destination": "X", "mileage": null, "alcoholCheck": null, "fuelRecord": null},
            {"id": 1, "timestamp": "2025-06-03T09:00:00+09:00", "destination": "Y", "mileage": null, "alcoholCheck": null, "fuelRecord": null}
        ]"#;
        let event = log.handle(Input::ImportContent {
            raw: raw.to_string(),
            policy: MergePolicy::AdditiveDedup,
        });

        assert_eq!(
            event,
            Event::ImportMerged {
                outcome: MergeOutcome::NothingNew,
                policy: MergePolicy::AdditiveDedup
            }
        );
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn test_scenario_d_month_filter_view() {
        let mut log = create_test_log();
        for (at, dest) in [
            ("2025-05-20T09:00:00+09:00", "May trip"),
            ("2025-06-01T09:00:00+09:00", "June 1 a"),
            ("2025-06-01T15:00:00+09:00", "June 1 b"),
            ("2025-06-02T09:00:00+09:00", "June 2"),
        ] {
            let event = submit(&mut log, RecordDraft::new(dest).mileage("10").at(ts(at)));
            assert!(matches!(event, Event::RecordAdded(_)));
        }

        let june: MonthKey = "2025-06".parse().unwrap();
        assert_eq!(
            log.handle(Input::SelectMonth(Some(june))),
            Event::FilterChanged(Some(june))
        );
        let view = log.view(&ts(NOW));

        assert_eq!(view.count, 3);
        assert_eq!(view.months.len(), 2);
        let days: Vec<_> = view.days.iter().map(|d| d.day.to_string()).collect();
        assert_eq!(days, vec!["2025-06-02", "2025-06-01"]);
        assert_eq!(view.days[0].label, "Today");
        assert_eq!(view.days[1].label, "Yesterday");
        assert_eq!(view.days[1].records[0].destination, "June 1 b");
        assert!((view.days[1].total_mileage - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_view_ascending_within_day() {
        let mut log = create_test_log().with_day_order(Chronology::Ascending);
        submit(&mut log, RecordDraft::new("A").mileage("1").at(ts("2025-06-01T09:00:00+09:00")));
        submit(&mut log, RecordDraft::new("B").at(ts("2025-06-01T10:00:00+09:00")));

        let view = log.view(&ts(NOW));
        assert_eq!(view.days[0].records[0].destination, "A");
    }

    #[test]
    fn test_delete_and_not_found() {
        let mut log = create_test_log();
        let Event::RecordAdded(record) = submit(&mut log, RecordDraft::new("A").mileage("1"))
        else {
            panic!("expected RecordAdded");
        };

        assert_eq!(
            log.handle(Input::Delete(record.id.clone())),
            Event::RecordRemoved(record.id.clone())
        );
        assert_eq!(
            log.handle(Input::Delete(record.id.clone())),
            Event::NotFound(NotFoundError { id: record.id })
        );
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("A").mileage("1"));

        assert_eq!(
            log.handle(Input::ClearAll),
            Event::ConfirmationRequired(PendingKind::ClearAll)
        );
        assert_eq!(log.store().len(), 1);

        assert_eq!(log.handle(Input::Confirm), Event::StoreCleared { removed: 1 });
        assert!(log.store().is_empty());
        assert!(log.pending().is_none());
    }

    #[test]
    fn test_cancel_leaves_store_unchanged() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("A").mileage("1"));
        log.handle(Input::ClearAll);

        assert_eq!(log.handle(Input::Cancel), Event::Cancelled(PendingKind::ClearAll));
        assert_eq!(log.store().len(), 1);
        assert_eq!(log.handle(Input::Confirm), Event::NothingPending);
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn test_replace_import_requires_confirmation() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("Old").mileage("1"));

        let raw = r#"[{"id": 40, "timestamp": "2025-06-03T08:00:00+09:00", "destination": "New"}]"#;
        let event = log.handle(Input::ImportContent {
            raw: raw.to_string(),
            policy: MergePolicy::Replace,
        });
        assert_eq!(event, Event::ConfirmationRequired(PendingKind::ReplaceImport));
        assert_eq!(log.store().all()[0].destination, "Old");

        let event = log.handle(Input::Confirm);
        assert_eq!(
            event,
            Event::ImportMerged {
                outcome: MergeOutcome::Replaced(1),
                policy: MergePolicy::Replace
            }
        );
        assert_eq!(log.store().all()[0].destination, "New");
        assert_eq!(log.store().next_id(), 41);
    }

    #[test]
    fn test_rejected_import_leaves_store_unchanged() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("A").mileage("1"));

        let event = log.handle(Input::ImportContent {
            raw: "{}".to_string(),
            policy: MergePolicy::Replace,
        });
        assert!(matches!(
            event,
            Event::ImportRejected(ParseError::MalformedPayload { .. })
        ));
        assert!(log.pending().is_none());
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn test_export_then_import_into_fresh_log() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("A").mileage("0").alcohol_check("0.0"));
        submit(&mut log, RecordDraft::new("B").fuel_record("25.5"));

        let Event::ExportReady { contents, filename } = log.handle(Input::Export) else {
            panic!("expected ExportReady");
        };
        assert_eq!(filename, "driving-log-2025-06-02.json");

        let mut fresh = create_test_log();
        let event = fresh.handle(Input::ImportContent {
            raw: contents,
            policy: MergePolicy::AdditiveDedup,
        });
        assert_eq!(
            event,
            Event::ImportMerged {
                outcome: MergeOutcome::Added(2),
                policy: MergePolicy::AdditiveDedup
            }
        );
        assert_eq!(fresh.store().all(), log.store().all());

        // Imported ids are never handed out again.
        let Event::RecordAdded(next) = submit(&mut fresh, RecordDraft::new("C")) else {
            panic!("expected RecordAdded");
        };
        assert_eq!(next.id, RecordId::Seq(3));
    }

    #[test]
    fn test_add_succeeds_iff_validation_succeeds() {
        use crate::validation::validate_candidate;

        let drafts = [
            RecordDraft::new(""),
            RecordDraft::new("A"),
            RecordDraft::new("A").mileage("5"),
            RecordDraft::new("B"),
            RecordDraft::new("C").mileage("-2"),
        ];
        let mut log = create_test_log();
        for draft in drafts {
            let before = log.store().len();
            let expected = validate_candidate(
                log.store().all(),
                &draft,
                log.store().rules(),
                ts(NOW),
            );
            let event = submit(&mut log, draft.clone());
            match expected {
                Ok(_) => {
                    assert!(matches!(event, Event::RecordAdded(_)));
                    assert_eq!(log.store().len(), before + 1);
                    assert!(log
                        .store()
                        .all()
                        .iter()
                        .any(|r| r.destination == draft.destination.trim()));
                }
                Err(err) => {
                    assert_eq!(event, Event::ValidationRejected(err));
                    assert_eq!(log.store().len(), before);
                }
            }
        }
    }

    fn import_additive(log: &mut DrivingLog, raw: &str) -> Event {
        log.handle(Input::ImportContent {
            raw: raw.to_string(),
            policy: MergePolicy::AdditiveDedup,
        })
    }

    #[test]
    fn test_submit_after_import_near_id_limit_never_reuses_ids() {
        let mut log = create_test_log();
        let event = import_additive(
            &mut log,
            r#"[{"id": 18446744073709551614, "timestamp": "2025-06-02T08:00:00+09:00", "destination": "X", "mileage": 1}]"#,
        );
        assert!(matches!(event, Event::ImportMerged { .. }));

        let event = submit(&mut log, RecordDraft::new("Y"));
        assert_eq!(event, Event::ValidationRejected(ValidationError::IdsExhausted));
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn test_import_of_max_id_is_rejected() {
        let mut log = create_test_log();
        let event = import_additive(
            &mut log,
            r#"[{"id": 18446744073709551615, "timestamp": "2025-06-02T08:00:00+09:00", "destination": "X"}]"#,
        );
        assert_eq!(
            event,
            Event::ImportRejected(ParseError::EmptyOrAllInvalid { skipped: 1 })
        );

        let Event::RecordAdded(record) = submit(&mut log, RecordDraft::new("Y").mileage("1"))
        else {
            panic!("expected RecordAdded");
        };
        assert_eq!(record.id, RecordId::Seq(1));
    }

    #[test]
    fn test_decimal_string_id_collides_with_sequential_id() {
        let mut log = create_test_log();
        submit(&mut log, RecordDraft::new("Home").mileage("100"));

        let event = import_additive(
            &mut log,
            r#"[{"id": "1", "timestamp": "2025-06-03T08:00:00+09:00", "destination": "X"}]"#,
        );
        assert_eq!(
            event,
            Event::ImportMerged {
                outcome: MergeOutcome::NothingNew,
                policy: MergePolicy::AdditiveDedup
            }
        );
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn test_delete_imported_timestamp_style_id() {
        let mut log = create_test_log();
        import_additive(
            &mut log,
            r#"[{"id": "1717000000000", "timestamp": "2025-06-01T08:00:00+09:00", "destination": "X"}]"#,
        );

        let id: RecordId = "1717000000000".parse().unwrap();
        assert_eq!(log.handle(Input::Delete(id.clone())), Event::RecordRemoved(id));
        assert!(log.store().is_empty());
    }

    #[tokio::test]
    async fn test_import_from_source() {
        let mut log = create_test_log();
        let source = TextSource(
            r#"[{"id": "abc", "timestamp": "2025-06-01T08:00:00+09:00", "destination": "A"}]"#
                .to_string(),
        );
        let event = log.import_from(&source, MergePolicy::AdditiveDedup).await;
        assert_eq!(
            event,
            Event::ImportMerged {
                outcome: MergeOutcome::Added(1),
                policy: MergePolicy::AdditiveDedup
            }
        );
    }

    #[tokio::test]
    async fn test_import_from_unreadable_source() {
        let mut log = create_test_log();
        let source = crate::transfer::FileSource::new("/nonexistent/file.json");
        let event = log.import_from(&source, MergePolicy::AdditiveDedup).await;
        assert!(matches!(
            event,
            Event::ImportRejected(ParseError::Unreadable { .. })
        ));
    }
}
