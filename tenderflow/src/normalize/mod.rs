//! Post-scrape cleanup: field normalization first, then deduplication.

mod clean;
mod dedup;

pub use clean::{clean_batch, clean_description, clean_record, clean_text, normalize_date};
pub use dedup::{dedup_tenders, DedupOutcome};

use crate::models::TenderRecord;
use tracing::info;

/// Cleans every record, then removes duplicates by tender id.
///
/// The order is fixed: deduplication always sees cleaned records, and the
/// kept record for a duplicated id is the first occurrence.
#[must_use]
pub fn clean_and_deduplicate(records: Vec<TenderRecord>) -> DedupOutcome {
    let cleaned = clean_batch(records);
    let outcome = dedup_tenders(cleaned);
    info!(
        unique = outcome.records.len(),
        removed = outcome.removed,
        "cleanup finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_runs_before_dedup() {
        let mut a = TenderRecord::new("9");
        a.title = "<i>Widening of NH-44</i>".to_string();
        let b = TenderRecord::new("9");

        let outcome = clean_and_deduplicate(vec![a, b]);

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.records[0].title, "Widening of NH-44");
    }
}
