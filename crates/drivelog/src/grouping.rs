//! Day grouping and month filtering of records.
//!
//! Day groups are always returned most recent day first. The order inside a
//! day is chosen explicitly by the caller with [`Chronology`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::datekey::{day_key, month_key, DayKey, MonthKey};
use crate::record::Record;

/// Order of records within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronology {
    /// Earliest first; the first element is the first record of the day.
    #[default]
    Ascending,
    /// Most recent first.
    Descending,
}

/// Records of a single calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup<'a> {
    /// The calendar day.
    pub day: DayKey,
    /// Records of that day in the requested order.
    pub records: Vec<&'a Record>,
}

impl DayGroup<'_> {
    /// Sum of the day's mileage readings.
    #[must_use]
    pub fn total_mileage(&self) -> f64 {
        daily_total_mileage(self.records.iter().copied())
    }
}

/// Keep only records in `month`; pass everything through when `None`.
#[must_use]
pub fn filter_by_month(records: &[Record], month: Option<MonthKey>) -> Vec<&Record> {
    match month {
        None => records.iter().collect(),
        Some(month) => records
            .iter()
            .filter(|r| month_key(&r.timestamp) == month)
            .collect(),
    }
}

/// Group records by calendar day, most recent day first.
pub fn group_by_day<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    within_day: Chronology,
) -> Vec<DayGroup<'a>> {
    let mut days: BTreeMap<DayKey, Vec<&'a Record>> = BTreeMap::new();
    for record in records {
        days.entry(day_key(&record.timestamp))
            .or_default()
            .push(record);
    }

    days.into_iter()
        .rev()
        .map(|(day, mut records)| {
            records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            if within_day == Chronology::Descending {
                records.reverse();
            }
            DayGroup { day, records }
        })
        .collect()
}

/// Distinct months present in `records`, most recent first.
#[must_use]
pub fn available_months(records: &[Record]) -> Vec<MonthKey> {
    records
        .iter()
        .map(|r| month_key(&r.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// Sum of present mileage values; absent readings count as zero.
pub fn daily_total_mileage<'a>(day_records: impl IntoIterator<Item = &'a Record>) -> f64 {
    day_records.into_iter().filter_map(|r| r.mileage).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;

    fn sample() -> Vec<Record> {
        vec![
            record(1, "2025-05-31T09:00:00+09:00", "May", Some(50.0)),
            record(2, "2025-06-01T08:00:00+09:00", "A", Some(100.0)),
            record(3, "2025-06-01T12:00:00+09:00", "B", None),
            record(4, "2025-06-01T18:00:00+09:00", "C", Some(20.5)),
            record(5, "2025-06-03T09:00:00+09:00", "D", Some(10.0)),
        ]
    }

    #[test]
    fn test_filter_passthrough() {
        let records = sample();
        assert_eq!(filter_by_month(&records, None).len(), records.len());
    }

    #[test]
    fn test_filter_by_month() {
        let records = sample();
        let june: MonthKey = "2025-06".parse().unwrap();
        let filtered = filter_by_month(&records, Some(june));

        assert_eq!(filtered.len(), 4);
        assert!(filtered.iter().all(|r| r.destination != "May"));
    }

    #[test]
    fn test_filter_by_month_no_matches() {
        let records = sample();
        let jan: MonthKey = "2024-01".parse().unwrap();
        assert!(filter_by_month(&records, Some(jan)).is_empty());
    }

    #[test]
    fn test_group_by_day_most_recent_day_first() {
        let records = sample();
        let groups = group_by_day(&records, Chronology::Ascending);

        let days: Vec<_> = groups.iter().map(|g| g.day.to_string()).collect();
        assert_eq!(days, vec!["2025-06-03", "2025-06-01", "2025-05-31"]);
    }

    #[test]
    fn test_group_by_day_within_day_order() {
        let records = sample();

        let asc = group_by_day(&records, Chronology::Ascending);
        let names: Vec<_> = asc[1].records.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let desc = group_by_day(&records, Chronology::Descending);
        let names: Vec<_> = desc[1].records.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_group_by_day_sorts_unordered_input() {
        let mut records = sample();
        records.reverse();
        let groups = group_by_day(&records, Chronology::Ascending);
        assert_eq!(groups[1].records[0].destination, "A");
    }

    #[test]
    fn test_group_by_day_conserves_records() {
        let records = sample();
        let june: MonthKey = "2025-06".parse().unwrap();
        let filtered = filter_by_month(&records, Some(june));
        let total = filtered.len();

        let groups = group_by_day(filtered, Chronology::Descending);
        let grouped: usize = groups.iter().map(|g| g.records.len()).sum();
        assert_eq!(grouped, total);

        let mut ids: Vec<_> = groups
            .iter()
            .flat_map(|g| g.records.iter().map(|r| r.id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_group_by_day_empty() {
        assert!(group_by_day(&[], Chronology::Ascending).is_empty());
    }

    #[test]
    fn test_available_months() {
        let records = sample();
        let months: Vec<_> = available_months(&records)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(months, vec!["2025-06", "2025-05"]);
    }

    #[test]
    fn test_daily_total_mileage_treats_absent_as_zero() {
        let records = sample();
        let groups = group_by_day(&records, Chronology::Ascending);

        assert!((groups[1].total_mileage() - 120.5).abs() < f64::EPSILON);
        assert!((daily_total_mileage(&[]) - 0.0).abs() < f64::EPSILON);
    }
}
