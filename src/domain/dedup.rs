//! Unique-caller counting.
//!
//! Only the first occurrence of a caller anywhere in the batch is ever considered.
//! Window and operator filters are applied to that first occurrence only, so a caller
//! who first called before the window and again inside it is not counted.

use crate::domain::cities::CityTable;
use crate::domain::entities::{DailyOperatorCalls, DateWindow, HistoryRecord};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Count first occurrences of each caller that pass `filter`, keyed by `classify`.
///
/// Records for which `classify` returns `None` are dropped silently.
pub fn unique_counts<K, F, C>(records: &[HistoryRecord], filter: F, classify: C) -> HashMap<K, usize>
where
    K: Eq + Hash,
    F: Fn(&HistoryRecord) -> bool,
    C: Fn(&HistoryRecord) -> Option<K>,
{
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    let mut result = HashMap::new();

    for record in records {
        if !seen.insert(record.caller.as_str()) {
            continue;
        }
        if !filter(record) {
            continue;
        }
        if let Some(key) = classify(record) {
            *result.entry(key).or_insert(0) += 1;
        }
    }

    result
}

/// Unique callers per city whose first call falls inside the window.
pub fn unique_calls_per_city(
    records: &[HistoryRecord],
    window: &DateWindow,
    cities: &CityTable,
) -> HashMap<String, usize> {
    unique_counts(
        records,
        |r| window.contains(r.date),
        |r| cities.classify(&r.line_number).map(String::from),
    )
}

/// Same as [`unique_calls_per_city`], but the first call must have been answered.
pub fn unique_received_calls_per_city(
    records: &[HistoryRecord],
    window: &DateWindow,
    cities: &CityTable,
) -> HashMap<String, usize> {
    unique_counts(
        records,
        |r| window.contains(r.date) && !r.operator.is_empty(),
        |r| cities.classify(&r.line_number).map(String::from),
    )
}

/// Answered unique calls per day and roster operator.
pub fn unique_received_calls_by_operator(
    records: &[HistoryRecord],
    window: &DateWindow,
    roster: &[String],
) -> DailyOperatorCalls {
    let counts = unique_counts(
        records,
        |r| window.contains(r.date) && roster.iter().any(|o| *o == r.operator),
        |r| Some((r.date, r.operator.clone())),
    );

    let mut result = DailyOperatorCalls::new();
    for ((date, operator), n) in counts {
        result.entry(date).or_default().insert(operator, n);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn call(d: u32, caller: &str, operator: &str, line: &str) -> HistoryRecord {
        HistoryRecord {
            date: day(d),
            caller: caller.to_string(),
            operator: operator.to_string(),
            line_number: line.to_string(),
        }
    }

    fn cities() -> CityTable {
        CityTable::new([("Москва", "^7495"), ("Спб", "^7812")]).unwrap()
    }

    #[test]
    fn test_repeat_caller_counted_once() {
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let records = vec![
            call(12, "100", "A", "74950000000"),
            call(13, "100", "A", "74950000000"),
            call(14, "100", "B", "78120000000"),
        ];
        let counts = unique_calls_per_city(&records, &window, &cities());
        assert_eq!(counts.get("Москва"), Some(&1));
        assert_eq!(counts.get("Спб"), None);
    }

    #[test]
    fn test_dedup_happens_before_window_filter() {
        let window = DateWindow::new(day(12), day(18)).unwrap();
        // First occurrence is before the window; the in-window repeat must be ignored.
        let records = vec![
            call(5, "100", "A", "74950000000"),
            call(13, "100", "A", "74950000000"),
            call(13, "200", "A", "74950000000"),
        ];
        let counts = unique_calls_per_city(&records, &window, &cities());
        assert_eq!(counts.get("Москва"), Some(&1));
    }

    #[test]
    fn test_received_requires_operator_on_first_call() {
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let records = vec![
            call(12, "100", "", "74950000000"),
            call(13, "100", "A", "74950000000"),
            call(13, "200", "B", "74950000000"),
        ];
        let total = unique_calls_per_city(&records, &window, &cities());
        let received = unique_received_calls_per_city(&records, &window, &cities());
        assert_eq!(total.get("Москва"), Some(&2));
        assert_eq!(received.get("Москва"), Some(&1));
    }

    #[test]
    fn test_unknown_line_is_dropped() {
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let records = vec![call(12, "100", "A", ""), call(12, "200", "A", "70000000000")];
        assert!(unique_calls_per_city(&records, &window, &cities()).is_empty());
    }

    #[test]
    fn test_received_by_operator_keys_by_date_and_roster() {
        let window = DateWindow::new(day(12), day(18)).unwrap();
        let roster = vec!["A".to_string(), "B".to_string()];
        let records = vec![
            call(12, "1", "A", ""),
            call(12, "2", "A", ""),
            call(12, "3", "Z", ""),
            call(13, "4", "B", ""),
            call(13, "1", "B", ""),
            call(20, "5", "A", ""),
        ];
        let by_operator = unique_received_calls_by_operator(&records, &window, &roster);
        assert_eq!(by_operator.len(), 2);
        assert_eq!(by_operator[&day(12)].get("A"), Some(&2));
        assert_eq!(by_operator[&day(12)].get("Z"), None);
        assert_eq!(by_operator[&day(13)].get("B"), Some(&1));
    }
}
