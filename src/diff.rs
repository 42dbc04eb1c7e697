//! New-item detection against delivery history.

use crate::models::{NotificationRecord, RunMode, SeenSet};
use itertools::Itertools;

/// Records whose id is not in `seen`, in input order.
///
/// Records in the same batch that share an id collapse to the first one, so a
/// title/date collision is delivered and remembered once.
pub fn diff(current: Vec<NotificationRecord>, seen: &SeenSet) -> Vec<NotificationRecord> {
    current
        .into_iter()
        .filter(|r| !seen.contains(&r.id))
        .unique_by(|r| r.id.clone())
        .collect()
}

/// Pick the records to deliver for this run.
///
/// A trial run returns everything that was fetched without looking at `seen`.
pub fn select_pending(
    current: Vec<NotificationRecord>,
    seen: &SeenSet,
    mode: RunMode,
) -> Vec<NotificationRecord> {
    match mode {
        RunMode::Trial => current,
        RunMode::Normal => diff(current, seen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(title: &str, date: &str) -> NotificationRecord {
        NotificationRecord::new(
            title.into(),
            date.into(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
    }

    fn fetched() -> Vec<NotificationRecord> {
        vec![record("X", "2024-01-01"), record("Y", "2024-01-02")]
    }

    fn ids(records: &[NotificationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_empty_history_returns_everything() {
        let out = diff(fetched(), &SeenSet::new());
        assert_eq!(ids(&out), vec!["X_2024-01-01", "Y_2024-01-02"]);
    }

    #[test]
    fn test_seen_records_are_dropped() {
        let seen = SeenSet::from(vec!["X_2024-01-01".to_string()]);
        let out = diff(fetched(), &seen);
        assert_eq!(ids(&out), vec!["Y_2024-01-02"]);
    }

    #[test]
    fn test_everything_seen_returns_nothing() {
        let seen = SeenSet::from(vec!["X_2024-01-01".to_string(), "Y_2024-01-02".to_string()]);
        assert!(diff(fetched(), &seen).is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let current = vec![record("C", ""), record("A", ""), record("B", "")];
        let seen = SeenSet::from(vec!["A".to_string()]);
        assert_eq!(ids(&diff(current, &seen)), vec!["C", "B"]);
    }

    #[test]
    fn test_colliding_ids_collapse() {
        let current = vec![record("Dup", "01.01.2024"), record("Dup", "01.01.2024")];
        assert_eq!(diff(current, &SeenSet::new()).len(), 1);
    }

    #[test]
    fn test_is_stable_across_calls() {
        let seen = SeenSet::from(vec!["Y_2024-01-02".to_string()]);
        assert_eq!(diff(fetched(), &seen), diff(fetched(), &seen));
    }

    #[test]
    fn test_trial_ignores_history() {
        let seen = SeenSet::from(vec!["X_2024-01-01".to_string(), "Y_2024-01-02".to_string()]);
        let out = select_pending(fetched(), &seen, RunMode::Trial);
        assert_eq!(out, fetched());
    }

    #[test]
    fn test_normal_mode_filters() {
        let seen = SeenSet::from(vec!["X_2024-01-01".to_string()]);
        let out = select_pending(fetched(), &seen, RunMode::Normal);
        assert_eq!(ids(&out), vec!["Y_2024-01-02"]);
    }
}
