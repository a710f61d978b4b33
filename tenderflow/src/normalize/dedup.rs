//! Duplicate removal keyed on tender id.

use crate::models::TenderRecord;
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of one deduplication pass.
#[derive(Debug)]
pub struct DedupOutcome {
    /// Surviving records, in their original order.
    pub records: Vec<TenderRecord>,
    /// How many records were dropped as duplicates.
    pub removed: u64,
}

/// Drops records whose tender id was already seen, keeping the first.
///
/// A single forward pass, so the earliest occurrence always wins and the
/// relative order of survivors is unchanged.
#[must_use]
pub fn dedup_tenders(records: Vec<TenderRecord>) -> DedupOutcome {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut removed = 0u64;

    for record in records {
        if seen.insert(record.tender_id.clone()) {
            unique.push(record);
        } else {
            debug!(tender_id = %record.tender_id, "duplicate tender dropped");
            removed += 1;
        }
    }

    if removed > 0 {
        info!(removed, "removed duplicate tenders");
    }
    DedupOutcome {
        records: unique,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> TenderRecord {
        TenderRecord::new(id).with_title(title)
    }

    #[test]
    fn first_occurrence_wins() {
        let outcome = dedup_tenders(vec![
            record("1", "first"),
            record("2", "other"),
            record("1", "second"),
        ]);

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].title, "first");
        assert_eq!(outcome.records[1].tender_id, "2");
    }

    #[test]
    fn removed_counts_every_extra_occurrence() {
        let outcome = dedup_tenders(vec![
            record("7", "a"),
            record("7", "b"),
            record("7", "c"),
        ]);

        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let outcome = dedup_tenders(Vec::new());
        assert_eq!(outcome.removed, 0);
        assert!(outcome.records.is_empty());
    }
}
