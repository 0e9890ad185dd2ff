use models::PerformanceRecord;
use std::collections::HashSet;

/// Statistics about a record merge operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

impl MergeStats {
    pub fn has_duplicates(&self) -> bool {
        self.skipped > 0
    }
}

/// Returns the records from `incoming` whose `unique_id` is neither in
/// `existing` nor repeated earlier in `incoming`. Order is preserved and
/// neither input is modified.
pub fn filter_new_records(
    existing: &[PerformanceRecord],
    incoming: &[PerformanceRecord],
) -> (Vec<PerformanceRecord>, MergeStats) {
    let mut seen: HashSet<&str> = existing.iter().map(|r| r.unique_id.as_str()).collect();

    let mut stats = MergeStats {
        total: incoming.len(),
        ..Default::default()
    };
    let mut fresh = Vec::new();

    for rec in incoming {
        if seen.insert(rec.unique_id.as_str()) {
            fresh.push(rec.clone());
            stats.added += 1;
        } else {
            stats.skipped += 1;
        }
    }

    (fresh, stats)
}

/// Appends new records to an existing set, skipping any `unique_id` already
/// present.
///
/// # Example
/// ```
/// use models::PerformanceRecord;
/// use utils::merge_records_with_deduplication;
///
/// let existing = vec![PerformanceRecord { unique_id: "A".into(), ..Default::default() }];
/// let incoming = vec![
///     PerformanceRecord { unique_id: "A".into(), ..Default::default() },
///     PerformanceRecord { unique_id: "B".into(), ..Default::default() },
/// ];
/// let (merged, stats) = merge_records_with_deduplication(existing, &incoming);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(stats.skipped, 1);
/// ```
pub fn merge_records_with_deduplication(
    mut existing: Vec<PerformanceRecord>,
    incoming: &[PerformanceRecord],
) -> (Vec<PerformanceRecord>, MergeStats) {
    let (fresh, stats) = filter_new_records(&existing, incoming);
    existing.extend(fresh);
    (existing, stats)
}

/// Removes every record whose id is listed. Returns how many were removed.
pub fn remove_records_by_ids(records: &mut Vec<PerformanceRecord>, ids: &[String]) -> usize {
    let remove: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let before = records.len();
    records.retain(|r| !remove.contains(r.unique_id.as_str()));
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, day: &str) -> PerformanceRecord {
        PerformanceRecord {
            unique_id: id.to_string(),
            day: day.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_with_no_duplicates() {
        let existing = vec![rec("R1", "2025-07-01")];
        let incoming = vec![rec("R2", "2025-07-02"), rec("R3", "2025-07-03")];

        let (merged, stats) = merge_records_with_deduplication(existing, &incoming);

        assert_eq!(stats.added, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.total, 2);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_with_duplicates() {
        let existing = vec![rec("R1", "2025-07-01"), rec("R2", "2025-07-02")];
        let incoming = vec![rec("R2", "2025-07-02"), rec("R3", "2025-07-03")];

        let (merged, stats) = merge_records_with_deduplication(existing, &incoming);

        assert_eq!(stats.added, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.has_duplicates());
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_filter_new_records_drops_repeats_within_batch() {
        let incoming = vec![rec("R1", "2025-07-01"), rec("R1", "2025-07-01")];
        let (fresh, stats) = filter_new_records(&[], &incoming);
        assert_eq!(fresh.len(), 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_remove_records_by_ids() {
        let mut records = vec![rec("R1", "a"), rec("R2", "b"), rec("R3", "c")];
        let removed = remove_records_by_ids(&mut records, &["R2".to_string(), "R9".to_string()]);
        assert_eq!(removed, 1);
        let ids: Vec<&str> = records.iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R3"]);
    }
}
