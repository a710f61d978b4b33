//! # Tenderflow
//!
//! A resilient scraping pipeline for government procurement tender portals.
//!
//! Tenderflow drives a real Chromium browser through a tender listing site
//! and turns what it finds into structured records:
//!
//! - **Managed browser sessions**: One tracked session per run, with scoped
//!   surfaces that are closed on every exit path
//! - **Bounded navigation retries**: Timeouts and doubling backoff around
//!   every page load, reported as outcomes instead of errors
//! - **Degrading search strategies**: Quick keyword box, status filter
//!   controls, then the advanced form, over ordered selector chains
//! - **Fault-tolerant extraction**: Independent sub-extractions per field;
//!   a page that gives up nothing still yields a usable record
//! - **Run metadata**: Monotonic counters, categorized errors, and timing
//!   for every run, persisted alongside the results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenderflow::prelude::*;
//!
//! let config = ScraperConfig::default();
//! let pipeline = ScrapePipeline::new(config, Arc::new(ShutdownToken::new()));
//!
//! let options = RunOptions { limit: Some(10), ..RunOptions::new() };
//! let report = pipeline.run(&options).await;
//!
//! println!("saved {} tenders", report.metadata.tenders_saved);
//! std::process::exit(report.status.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod browser;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod extract;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::browser::{
        BrowserSession, NavigationOutcome, NavigationSurface, Navigator, SurfaceGuard,
    };
    pub use crate::cancellation::ShutdownToken;
    pub use crate::config::{
        FormFieldSelectors, NavigationConfig, ScraperConfig, SelectorBook,
    };
    pub use crate::errors::{
        BrowserError, ConfigError, PipelineError, ScrapeError, StorageError,
    };
    pub use crate::extract::{
        extract_listing, AttachmentExtractor, ClassifierPolicy, DetailExtractor,
        ListingRow,
    };
    pub use crate::metadata::{
        count_tender_types, generate_run_id, RunMetadata, RunTracker,
    };
    pub use crate::models::{
        Attachment, ContactInfo, RequiredDocument, StageForm, TenderRecord,
        TenderStage, TenderStatus, TenderType,
    };
    pub use crate::normalize::{clean_and_deduplicate, DedupOutcome};
    pub use crate::pipeline::{RunOptions, RunReport, RunStatus, ScrapePipeline};
    pub use crate::search::{
        FormSurface, SearchController, SearchFilters, SearchMode, SearchOutcome,
    };
    pub use crate::storage::{MetadataStore, OutputFormat, TenderStore};
}
