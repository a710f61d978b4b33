//! End-to-end scrape orchestration.
//!
//! A run walks one browser session through the portal: load the start
//! page, apply any search filters, harvest the listing, then visit each
//! tender's detail page on its own surface. Per-tender faults are
//! recorded on the run tracker and the loop keeps going; only an
//! unreachable start page or a broken browser aborts the run. The
//! tracker is finalized on every path, including failures and
//! interruption.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::browser::{BrowserSession, NavigationOutcome, Navigator, SurfaceGuard};
use crate::cancellation::ShutdownToken;
use crate::config::ScraperConfig;
use crate::errors::{PipelineError, ScrapeError};
use crate::extract::{extract_listing, AttachmentExtractor, DetailExtractor, ListingRow};
use crate::metadata::{count_tender_types, generate_run_id, RunMetadata, RunTracker};
use crate::models::TenderRecord;
use crate::normalize::clean_and_deduplicate;
use crate::search::{SearchController, SearchFilters};
use crate::storage::{MetadataStore, OutputFormat, TenderStore};

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cap on the number of tenders processed, `None` for all.
    pub limit: Option<usize>,
    /// Whether detail pages are visited per tender.
    pub scrape_details: bool,
    /// Skip all persistence when set.
    pub dry_run: bool,
    /// Output format for the tender batch.
    pub format: OutputFormat,
    /// Explicit output filename, overriding the timestamped default.
    pub save_file: Option<String>,
    /// Search criteria applied before the listing is read.
    pub filters: SearchFilters,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            scrape_details: true,
            dry_run: false,
            format: OutputFormat::Json,
            save_file: None,
            filters: SearchFilters::default(),
        }
    }
}

impl RunOptions {
    /// Creates options with defaults: all tenders, details on, JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The run went through and its results were handled.
    Completed,
    /// A shutdown request stopped the run partway.
    Interrupted,
    /// A fatal error aborted the run.
    Failed,
}

impl RunStatus {
    /// The process exit code conventionally paired with the status.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Interrupted => 130,
            Self::Failed => 1,
        }
    }
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    /// The cleaned records, or whatever was collected before an abort.
    pub records: Vec<TenderRecord>,
    /// The finalized run metadata.
    pub metadata: RunMetadata,
    /// How the run ended.
    pub status: RunStatus,
}

/// Drives complete scrape runs against a configured portal.
pub struct ScrapePipeline {
    config: ScraperConfig,
    shutdown: Arc<ShutdownToken>,
}

impl ScrapePipeline {
    /// Creates a pipeline; `shutdown` is polled between tenders.
    #[must_use]
    pub const fn new(config: ScraperConfig, shutdown: Arc<ShutdownToken>) -> Self {
        Self { config, shutdown }
    }

    /// Runs one full scrape.
    ///
    /// Never returns an error: fatal failures are recorded on the run
    /// metadata and reported through [`RunStatus::Failed`], and the
    /// tracker is finalized on every path.
    pub async fn run(&self, options: &RunOptions) -> RunReport {
        let run_id = generate_run_id();
        info!(
            run_id = %run_id,
            limit = ?options.limit,
            format = %options.format,
            dry_run = options.dry_run,
            scrape_details = options.scrape_details,
            "tender scrape starting"
        );

        let mut tracker = RunTracker::new(&run_id, config_snapshot(&self.config, options));

        if let Err(e) = self.config.validate() {
            error!(%e, "configuration rejected");
            return Self::abort(tracker, e.to_string());
        }

        let records = match self.collect(options, &mut tracker).await {
            Ok(records) => records,
            Err(e) => {
                error!(%e, "scraping failed");
                return Self::abort(tracker, e.to_string());
            }
        };

        if self.shutdown.is_triggered() {
            let reason = self
                .shutdown
                .reason()
                .unwrap_or_else(|| "User cancelled the operation".to_string());
            warn!(collected = records.len(), "run interrupted; skipping save");
            tracker.record_error("Interrupted", reason);
            tracker.finalize();
            return RunReport {
                records,
                metadata: tracker.into_metadata(),
                status: RunStatus::Interrupted,
            };
        }

        info!(count = records.len(), "cleaning and deduplicating");
        let outcome = clean_and_deduplicate(records);
        tracker.set_deduped_count(outcome.removed);
        tracker.record_saved(outcome.records.len() as u64);
        tracker.set_type_counts(count_tender_types(&outcome.records));
        let records = outcome.records;
        info!(count = records.len(), removed = outcome.removed, "final unique tender count");

        if options.dry_run {
            info!("dry run; skipping data save");
        } else {
            let store = TenderStore::new(&self.config.output_dir, options.format);
            match store.save_as(&records, options.save_file.as_deref()).await {
                Ok(path) => tracker.set_output_file(path.display().to_string()),
                Err(e) => {
                    error!(%e, "failed to save tenders");
                    return Self::abort_with(tracker, e.to_string(), records);
                }
            }
        }

        tracker.finalize();

        if !options.dry_run {
            let metadata_store = MetadataStore::new(&self.config.metadata_dir);
            if let Err(e) = metadata_store.save(tracker.metadata()).await {
                error!(%e, "failed to save run metadata");
                return Self::abort_with(tracker, e.to_string(), records);
            }
        }

        info!(run_id = %run_id, "scraping completed");
        RunReport {
            records,
            metadata: tracker.into_metadata(),
            status: RunStatus::Completed,
        }
    }

    fn abort(tracker: RunTracker, cause: String) -> RunReport {
        Self::abort_with(tracker, cause, Vec::new())
    }

    fn abort_with(mut tracker: RunTracker, cause: String, records: Vec<TenderRecord>) -> RunReport {
        tracker.record_error("Fatal", cause);
        tracker.finalize();
        RunReport {
            records,
            metadata: tracker.into_metadata(),
            status: RunStatus::Failed,
        }
    }

    /// Brings the browser up, harvests, and always tears it down.
    async fn collect(
        &self,
        options: &RunOptions,
        tracker: &mut RunTracker,
    ) -> Result<Vec<TenderRecord>, ScrapeError> {
        let mut session = BrowserSession::new(self.config.clone());
        session.start().await?;

        let outcome = match session.open_surface().await {
            Ok(surface) => {
                let records = self.harvest(&session, &surface, options, tracker).await;
                if let Err(cause) = surface.close().await {
                    warn!(%cause, "failed to close the listing surface");
                }
                records
            }
            Err(e) => Err(e.into()),
        };

        if let Err(cause) = session.shutdown().await {
            warn!(%cause, "browser shutdown reported an error");
        }
        outcome
    }

    async fn harvest(
        &self,
        session: &BrowserSession,
        surface: &SurfaceGuard,
        options: &RunOptions,
        tracker: &mut RunTracker,
    ) -> Result<Vec<TenderRecord>, ScrapeError> {
        let navigator = Navigator::new(self.config.navigation.clone());

        info!(url = %self.config.base_url, "loading the start page");
        let outcome = navigator.goto(surface.page(), &self.config.base_url).await;
        if let NavigationOutcome::Failed { cause, .. } = outcome {
            return Err(PipelineError::StartPageUnreachable {
                url: self.config.base_url.clone(),
                cause,
            }
            .into());
        }
        tracker.record_pages(1);
        info!("start page loaded");

        let filters = &options.filters;
        if filters.has_filters() {
            info!("applying search filters");
            let controller = SearchController::new(
                self.config.base_url.clone(),
                self.config.selectors.clone(),
                navigator.clone(),
            );
            let outcome = if let Some(keyword) = &filters.keyword {
                controller.simple_search(surface.page(), keyword).await
            } else if let Some(status) = filters.tender_status {
                controller.filter_by_status(surface.page(), status).await
            } else {
                controller.advanced_search(surface.page(), filters).await
            };
            if outcome.applied {
                info!(mode = ?outcome.mode, "search filter applied");
            } else {
                warn!(mode = ?outcome.mode, "search failed; continuing with the unfiltered listing");
            }
            sleep(self.config.settle_after_search()).await;
        } else {
            sleep(self.config.settle_after_load()).await;
        }

        info!("extracting the tender listing");
        if !navigator
            .wait_for_selector(surface.page(), &self.config.selectors.listing_wait)
            .await
        {
            warn!("listing table never rendered; parsing the page as-is");
        }
        let mut listing = match surface.page().content().await {
            Ok(html) => extract_listing(&html, &self.config.selectors),
            Err(e) => {
                error!(%e, "could not read the listing page");
                tracker.record_error("ParseError", e.to_string());
                Vec::new()
            }
        };
        info!(count = listing.len(), "tender rows found");

        if let Some(limit) = options.limit {
            if listing.len() > limit {
                listing.truncate(limit);
                info!(count = listing.len(), "listing limited");
            }
        }

        let records = if options.scrape_details {
            self.scrape_details(session, &navigator, &listing, tracker)
                .await
        } else {
            self.basic_records(&listing, tracker)
        };

        info!(count = records.len(), "scraping pass completed");
        Ok(records)
    }

    /// Visits each tender's detail page on a fresh surface.
    ///
    /// Failures downgrade the tender to its listing-sourced record and
    /// are recorded under a category naming the failed step.
    async fn scrape_details(
        &self,
        session: &BrowserSession,
        navigator: &Navigator,
        listing: &[ListingRow],
        tracker: &mut RunTracker,
    ) -> Vec<TenderRecord> {
        info!("scraping full details from detail pages");
        let detail_extractor =
            DetailExtractor::new(self.config.selectors.clone(), self.config.classifier.clone());
        let attachment_extractor = match Url::parse(&self.config.base_url) {
            Ok(base) => Some(AttachmentExtractor::new(base, self.config.selectors.clone())),
            Err(e) => {
                warn!(%e, "base url does not parse; document harvesting disabled");
                None
            }
        };

        let total = listing.len();
        let mut records = Vec::with_capacity(total);
        for (idx, row) in listing.iter().enumerate() {
            let position = idx + 1;
            if self.shutdown.is_triggered() {
                warn!(position, total, "shutdown requested; stopping the detail loop");
                break;
            }

            info!(position, total, tender_id = %row.tender_id, "processing tender");
            let record = self
                .scrape_one(
                    session,
                    navigator,
                    &detail_extractor,
                    attachment_extractor.as_ref(),
                    row,
                    tracker,
                )
                .await;
            records.push(record);

            if position < total {
                sleep(self.config.rate_limit()).await;
            }
            if position % 5 == 0 {
                info!(position, total, "detail progress");
            }
        }
        records
    }

    /// Scrapes one tender, falling back to its listing-sourced record.
    async fn scrape_one(
        &self,
        session: &BrowserSession,
        navigator: &Navigator,
        detail_extractor: &DetailExtractor,
        attachment_extractor: Option<&AttachmentExtractor>,
        row: &ListingRow,
        tracker: &mut RunTracker,
    ) -> TenderRecord {
        let url = self.detail_url(row);
        let surface = match session.open_surface().await {
            Ok(surface) => surface,
            Err(e) => {
                warn!(tender_id = %row.tender_id, %e, "could not open a detail surface");
                tracker.record_error("DetailScraping", format!("tender {}: {e}", row.tender_id));
                return self.listing_record(row);
            }
        };

        let detailed = if navigator.goto(surface.page(), &url).await.is_success() {
            tracker.record_pages(1);
            match surface.page().content().await {
                Ok(html) => {
                    let mut record = detail_extractor.extract(&html, &row.tender_id, &url);
                    if let Some(extractor) = attachment_extractor {
                        self.harvest_documents(session, navigator, extractor, &html, &mut record)
                            .await;
                    }
                    tracker.record_parsed(1);
                    info!(tender_id = %row.tender_id, "tender scraped");
                    Some(record)
                }
                Err(e) => {
                    warn!(tender_id = %row.tender_id, %e, "could not read the detail page");
                    tracker.record_error(
                        "DetailExtraction",
                        format!("tender {}: {e}", row.tender_id),
                    );
                    None
                }
            }
        } else {
            warn!(tender_id = %row.tender_id, url = %url, "detail page unreachable");
            tracker.record_error(
                "Navigation",
                format!("tender {}: detail page unreachable", row.tender_id),
            );
            None
        };

        if let Err(cause) = surface.close().await {
            warn!(tender_id = %row.tender_id, %cause, "failed to close the detail surface");
        }
        detailed.unwrap_or_else(|| self.listing_record(row))
    }

    /// Follows the detail page's document link on an isolated surface
    /// and attaches whatever the listing yields.
    async fn harvest_documents(
        &self,
        session: &BrowserSession,
        navigator: &Navigator,
        extractor: &AttachmentExtractor,
        detail_html: &str,
        record: &mut TenderRecord,
    ) {
        let Some(link) = extractor.find_document_link(detail_html) else {
            return;
        };
        debug!(tender_id = %record.tender_id, url = %link, "opening the document listing");

        let surface = match session.open_surface().await {
            Ok(surface) => surface,
            Err(e) => {
                warn!(tender_id = %record.tender_id, %e, "could not open a document surface");
                return;
            }
        };

        if navigator.goto(surface.page(), &link).await.is_success() {
            if !navigator
                .wait_for_selector(surface.page(), &self.config.selectors.document_listing_wait)
                .await
            {
                debug!(tender_id = %record.tender_id, "document listing never rendered");
            }
            match surface.page().content().await {
                Ok(html) => {
                    let attachments = extractor.parse_listing(&html);
                    record.document_count = attachments.len() as u32;
                    record.attachments = attachments;
                }
                Err(e) => {
                    warn!(tender_id = %record.tender_id, %e, "could not read the document listing");
                }
            }
        } else {
            warn!(tender_id = %record.tender_id, url = %link, "document listing unreachable");
        }

        if let Err(cause) = surface.close().await {
            warn!(tender_id = %record.tender_id, %cause, "failed to close the document surface");
        }
    }

    /// Builds records straight from listing rows, no detail visits.
    fn basic_records(&self, listing: &[ListingRow], tracker: &mut RunTracker) -> Vec<TenderRecord> {
        info!("processing basic tender information");
        let total = listing.len();
        let mut records = Vec::with_capacity(total);
        for (idx, row) in listing.iter().enumerate() {
            records.push(self.listing_record(row));
            tracker.record_parsed(1);

            let position = idx + 1;
            if position % 10 == 0 {
                info!(position, total, "listing progress");
            }
        }
        records
    }

    /// A record carrying only what the listing row showed.
    fn listing_record(&self, row: &ListingRow) -> TenderRecord {
        let mut record = TenderRecord::new(&row.tender_id);
        if let Some(title) = &row.title {
            record.title = title.clone();
        }
        if let Some(organization) = &row.organization {
            record.organization = organization.clone();
        }
        record.ifb_number = row.ifb_number.clone();
        record.closing_date = row.closing_date.clone();
        record.estimated_value = row.estimated_value;
        record.document_count = row.document_count.unwrap_or(0);
        record.source_url = Some(self.detail_url(row));
        record.raw_html_snippet = Some(row.raw_html.clone());
        record
    }

    /// The absolute URL of a tender's detail page.
    fn detail_url(&self, row: &ListingRow) -> String {
        match &row.detail_href {
            Some(href) if href.starts_with("http") => href.clone(),
            Some(href) => Url::parse(&self.config.base_url)
                .and_then(|base| base.join(href))
                .map_or_else(
                    |_| format!("{}{href}", self.config.base_url),
                    |url| url.to_string(),
                ),
            None => format!(
                "{}/view-nit-home?id={}",
                self.config.base_url, row.tender_id
            ),
        }
    }
}

/// The configuration snapshot stored in run metadata.
fn config_snapshot(config: &ScraperConfig, options: &RunOptions) -> serde_json::Value {
    serde_json::json!({
        "limit": options.limit,
        "format": options.format.to_string(),
        "concurrency": config.concurrency,
        "rate_limit": config.rate_limit_secs,
        "headless": config.headless,
        "scrape_details": options.scrape_details,
        "search_filters": options.filters.has_filters().then_some(&options.filters),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(tender_id: &str) -> ListingRow {
        ListingRow {
            tender_id: tender_id.to_string(),
            ifb_number: Some("IFB/2026/9".to_string()),
            title: Some("Road Resurfacing".to_string()),
            organization: Some("Roads Department".to_string()),
            estimated_value: Some(125_000.0),
            closing_date: Some("2026-09-01".to_string()),
            document_count: Some(2),
            detail_href: Some("/view-nit-home?id=T-9".to_string()),
            raw_html: "<tr></tr>".to_string(),
        }
    }

    fn pipeline() -> ScrapePipeline {
        ScrapePipeline::new(ScraperConfig::default(), Arc::new(ShutdownToken::new()))
    }

    #[test]
    fn listing_records_carry_row_fields() {
        let record = pipeline().listing_record(&row("T-9"));

        assert_eq!(record.tender_id, "T-9");
        assert_eq!(record.title, "Road Resurfacing");
        assert_eq!(record.organization, "Roads Department");
        assert_eq!(record.estimated_value, Some(125_000.0));
        assert_eq!(record.document_count, 2);
        assert_eq!(
            record.source_url.as_deref(),
            Some("https://tender.nprocure.com/view-nit-home?id=T-9")
        );
    }

    #[test]
    fn bare_rows_fall_back_to_placeholders() {
        let bare = ListingRow {
            tender_id: "T-2".to_string(),
            ifb_number: None,
            title: None,
            organization: None,
            estimated_value: None,
            closing_date: None,
            document_count: None,
            detail_href: None,
            raw_html: String::new(),
        };
        let record = pipeline().listing_record(&bare);

        assert_eq!(record.title, "Tender T-2");
        assert_eq!(record.organization, "Unknown Organization");
        assert_eq!(record.document_count, 0);
        assert_eq!(
            record.source_url.as_deref(),
            Some("https://tender.nprocure.com/view-nit-home?id=T-2")
        );
    }

    #[test]
    fn detail_urls_resolve_against_the_base() {
        let pipeline = pipeline();

        let relative = pipeline.detail_url(&row("T-9"));
        assert_eq!(relative, "https://tender.nprocure.com/view-nit-home?id=T-9");

        let mut absolute = row("T-9");
        absolute.detail_href = Some("https://mirror.example/t/9".to_string());
        assert_eq!(pipeline.detail_url(&absolute), "https://mirror.example/t/9");
    }

    #[test]
    fn basic_records_count_as_parsed() {
        let pipeline = pipeline();
        let mut tracker = RunTracker::new("run_test", serde_json::json!({}));

        let records = pipeline.basic_records(&[row("T-1"), row("T-2")], &mut tracker);

        assert_eq!(records.len(), 2);
        assert_eq!(tracker.metadata().tenders_parsed, 2);
    }

    #[test]
    fn snapshot_omits_absent_filters() {
        let options = RunOptions::new();
        let snapshot = config_snapshot(&ScraperConfig::default(), &options);
        assert!(snapshot["search_filters"].is_null());

        let filtered = RunOptions {
            filters: SearchFilters::new().with_keyword("roads"),
            ..RunOptions::new()
        };
        let snapshot = config_snapshot(&ScraperConfig::default(), &filtered);
        assert_eq!(snapshot["search_filters"]["keyword"], "roads");
    }

    #[test]
    fn statuses_map_to_exit_codes() {
        assert_eq!(RunStatus::Completed.exit_code(), 0);
        assert_eq!(RunStatus::Interrupted.exit_code(), 130);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_touching_the_browser() {
        let config = ScraperConfig::default().with_rate_limit(99.0);
        let pipeline = ScrapePipeline::new(config, Arc::new(ShutdownToken::new()));

        let report = pipeline.run(&RunOptions::new()).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.records.is_empty());
        assert!(report.metadata.duration_seconds.is_some());
        assert!(report.metadata.error_summary.contains_key("Fatal"));
    }
}
