//! Run metadata accumulation.
//!
//! The orchestrator owns one [`RunTracker`] per run and feeds it events as
//! they happen; nothing here is globally shared. Counters only grow, the
//! error log only appends, and [`RunTracker::finalize`] stamps the end time.

use crate::models::{TenderRecord, TenderType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// One entry in the categorized error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Human-readable failure description.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Everything recorded about one scraping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Run identifier, `run_YYYYMMDD_HHMMSS`.
    pub run_id: String,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run finished; set by finalize.
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds between start and end; set by finalize.
    pub duration_seconds: Option<f64>,
    /// Version of the scraper that produced this run.
    pub scraper_version: String,
    /// Snapshot of the effective configuration.
    pub config: serde_json::Value,
    /// Pages visited, including the start page.
    pub pages_visited: u64,
    /// Tenders successfully parsed.
    pub tenders_parsed: u64,
    /// Tenders surviving cleanup and persisted.
    pub tenders_saved: u64,
    /// Recorded failures across all categories.
    pub failures: u64,
    /// Duplicate records removed by deduplication.
    pub deduped_count: u64,
    /// Final record count per tender type; all four keys always present.
    pub tender_types_processed: BTreeMap<String, u64>,
    /// Append-only error log keyed by category.
    pub error_summary: BTreeMap<String, Vec<ErrorEntry>>,
    /// Where results were written, when not a dry run.
    pub output_file: Option<String>,
}

impl RunMetadata {
    /// Creates run metadata stamped with the current time.
    #[must_use]
    pub fn new(run_id: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            scraper_version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            pages_visited: 0,
            tenders_parsed: 0,
            tenders_saved: 0,
            failures: 0,
            deduped_count: 0,
            tender_types_processed: BTreeMap::new(),
            error_summary: BTreeMap::new(),
            output_file: None,
        }
    }
}

/// Accumulates counters, timing, and categorized errors for one run.
#[derive(Debug)]
pub struct RunTracker {
    metadata: RunMetadata,
}

impl RunTracker {
    /// Creates a tracker around fresh metadata.
    #[must_use]
    pub fn new(run_id: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            metadata: RunMetadata::new(run_id, config),
        }
    }

    /// Records visited pages.
    pub fn record_pages(&mut self, count: u64) {
        self.metadata.pages_visited += count;
    }

    /// Records parsed tenders.
    pub fn record_parsed(&mut self, count: u64) {
        self.metadata.tenders_parsed += count;
    }

    /// Records saved tenders.
    pub fn record_saved(&mut self, count: u64) {
        self.metadata.tenders_saved += count;
    }

    /// Appends a categorized error and counts it as a failure.
    pub fn record_error(&mut self, category: impl Into<String>, message: impl Into<String>) {
        let entry = ErrorEntry {
            message: message.into(),
            timestamp: Utc::now(),
        };
        self.metadata
            .error_summary
            .entry(category.into())
            .or_default()
            .push(entry);
        self.metadata.failures += 1;
    }

    /// Sets the count of records removed by deduplication.
    pub fn set_deduped_count(&mut self, count: u64) {
        self.metadata.deduped_count = count;
    }

    /// Replaces the per-type counts.
    pub fn set_type_counts(&mut self, counts: BTreeMap<String, u64>) {
        self.metadata.tender_types_processed = counts;
    }

    /// Records where results were written.
    pub fn set_output_file(&mut self, path: impl Into<String>) {
        self.metadata.output_file = Some(path.into());
    }

    /// Stamps the end time and computes the run duration.
    ///
    /// Expected to be called exactly once. Calling it again overwrites the
    /// end time and recomputes the duration from the original start; that
    /// overwrite is the documented contract, not an accident.
    pub fn finalize(&mut self) {
        let end = Utc::now();
        let duration = (end - self.metadata.start_time).num_milliseconds() as f64 / 1000.0;
        self.metadata.end_time = Some(end);
        self.metadata.duration_seconds = Some(duration);
        info!(
            run_id = %self.metadata.run_id,
            duration_seconds = duration,
            parsed = self.metadata.tenders_parsed,
            saved = self.metadata.tenders_saved,
            failures = self.metadata.failures,
            "run finalized"
        );
    }

    /// Read access to the accumulated metadata.
    #[must_use]
    pub const fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Consumes the tracker, yielding the metadata.
    #[must_use]
    pub fn into_metadata(self) -> RunMetadata {
        self.metadata
    }
}

/// Generates a timestamped run id.
#[must_use]
pub fn generate_run_id() -> String {
    format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Counts records per tender type, with every type key present.
#[must_use]
pub fn count_tender_types(records: &[TenderRecord]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = TenderType::ALL
        .iter()
        .map(|ty| (ty.label().to_string(), 0))
        .collect();
    for record in records {
        *counts.entry(record.tender_type.label().to_string()).or_default() += 1;
    }
    counts
}
