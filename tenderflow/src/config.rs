//! Configuration for the scraping pipeline.
//!
//! All tunable behavior lives here as explicit values handed to components at
//! construction: bounded numeric knobs, the browser profile, and the ordered
//! selector fallback chains (`SelectorBook`) that drive search and
//! extraction. Knobs are validated by [`ScraperConfig::validate`] and
//! rejected at configuration time, not discovered mid-run.

use crate::errors::ConfigError;
use crate::extract::ClassifierPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Top-level configuration for a scraping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Base URL of the tender listing site.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User agent presented by the browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whether the browser runs headless.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Concurrency bound (1-10). The pipeline currently runs one session;
    /// the knob is validated and carried for future multi-session use.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Fixed delay between tender requests in seconds (0.1-10.0).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: f64,
    /// Settle delay after a search or filter is applied, in seconds.
    #[serde(default = "default_settle_after_search")]
    pub settle_after_search_secs: f64,
    /// Settle delay after the start page loads without filters, in seconds.
    #[serde(default = "default_settle_after_load")]
    pub settle_after_load_secs: f64,
    /// Directory for result files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory for run metadata files.
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,
    /// Navigation retry and timeout tuning.
    #[serde(default)]
    pub navigation: NavigationConfig,
    /// Ordered selector fallback chains.
    #[serde(default)]
    pub selectors: SelectorBook,
    /// Keyword sets and priority order for type and status classification.
    #[serde(default)]
    pub classifier: ClassifierPolicy,
}

fn default_base_url() -> String {
    "https://tender.nprocure.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_headless() -> bool {
    true
}

fn default_concurrency() -> u32 {
    3
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_settle_after_search() -> f64 {
    3.0
}

fn default_settle_after_load() -> f64 {
    2.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("data/metadata")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            headless: default_headless(),
            concurrency: default_concurrency(),
            rate_limit_secs: default_rate_limit(),
            settle_after_search_secs: default_settle_after_search(),
            settle_after_load_secs: default_settle_after_load(),
            output_dir: default_output_dir(),
            metadata_dir: default_metadata_dir(),
            navigation: NavigationConfig::default(),
            selectors: SelectorBook::default(),
            classifier: ClassifierPolicy::default(),
        }
    }
}

impl ScraperConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the headless toggle.
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets the inter-request delay in seconds.
    #[must_use]
    pub const fn with_rate_limit(mut self, secs: f64) -> Self {
        self.rate_limit_secs = secs;
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// The inter-request delay as a [`Duration`].
    #[must_use]
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_secs)
    }

    /// The post-search settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_after_search(&self) -> Duration {
        Duration::from_secs_f64(self.settle_after_search_secs)
    }

    /// The post-load settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_after_load(&self) -> Duration {
        Duration::from_secs_f64(self.settle_after_load_secs)
    }

    /// Checks every bounded knob, rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Empty { field: "base_url" });
        }
        if Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                field: "base_url",
                value: self.base_url.clone(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Empty { field: "user_agent" });
        }
        if !(1..=10).contains(&self.concurrency) {
            return Err(ConfigError::out_of_range(
                "concurrency",
                self.concurrency,
                1,
                10,
            ));
        }
        if !(0.1..=10.0).contains(&self.rate_limit_secs) {
            return Err(ConfigError::out_of_range(
                "rate_limit_secs",
                self.rate_limit_secs,
                0.1,
                10.0,
            ));
        }
        self.navigation.validate()
    }
}

/// Retry and timeout tuning for page navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Per-attempt navigation timeout in seconds (5-300).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum navigation attempts per page (0-10).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay between failed attempts, in seconds. The delay
    /// doubles after each failure: attempt 0 waits the base, attempt 1
    /// twice the base, and so on.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: f64,
    /// Timeout for element readiness waits, in seconds.
    #[serde(default = "default_selector_wait")]
    pub selector_wait_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    1.0
}

fn default_selector_wait() -> u64 {
    10
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base(),
            selector_wait_secs: default_selector_wait(),
        }
    }
}

impl NavigationConfig {
    /// Creates a navigation configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Readiness-wait timeout as a [`Duration`].
    #[must_use]
    pub const fn selector_wait(&self) -> Duration {
        Duration::from_secs(self.selector_wait_secs)
    }

    /// The backoff delay before retrying after the given failed attempt.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2.0_f64.powi(attempt.min(16) as i32);
        Duration::from_secs_f64(self.backoff_base_secs * factor)
    }

    /// Checks the bounded knobs.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(5..=300).contains(&self.timeout_secs) {
            return Err(ConfigError::out_of_range(
                "navigation.timeout_secs",
                self.timeout_secs,
                5,
                300,
            ));
        }
        if self.max_retries > 10 {
            return Err(ConfigError::out_of_range(
                "navigation.max_retries",
                self.max_retries,
                0,
                10,
            ));
        }
        if self.backoff_base_secs <= 0.0 || self.backoff_base_secs > 30.0 {
            return Err(ConfigError::out_of_range(
                "navigation.backoff_base_secs",
                self.backoff_base_secs,
                "0.0 (exclusive)",
                30.0,
            ));
        }
        Ok(())
    }
}

/// Ordered selector fallback chains for search and extraction.
///
/// Each list is probed top-down; the first selector that matches wins. The
/// defaults mirror the markup shapes the target site has been observed to
/// render; overriding them requires no code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorBook {
    /// Candidate quick-search input boxes.
    pub keyword_inputs: Vec<String>,
    /// Status filter selector templates. `{status}` expands to the label,
    /// `{slug}` to its lower-hyphenated form.
    pub status_filter_templates: Vec<String>,
    /// Element groups scanned by text for status filters, in priority order.
    pub clickable_scans: Vec<String>,
    /// Containers that signal the search form is present.
    pub search_form_wait: Vec<String>,
    /// Candidate selectors per search form field.
    pub form_fields: FormFieldSelectors,
    /// Candidate submit controls, probed before the text-label scan.
    pub submit_buttons: Vec<String>,
    /// Button labels accepted by the submit text scan.
    pub submit_labels: Vec<String>,
    /// The text input that receives the last-resort Enter press.
    pub text_input: String,
    /// Element that signals the listing table has rendered.
    pub listing_wait: String,
    /// Listing table rows.
    pub listing_rows: String,
    /// Candidate detail-page title elements.
    pub title: Vec<String>,
    /// Candidate description containers.
    pub description: Vec<String>,
    /// Candidate eligibility containers.
    pub eligibility: Vec<String>,
    /// Candidate specifications containers.
    pub specifications: Vec<String>,
    /// Candidate terms-and-conditions containers.
    pub terms: Vec<String>,
    /// Candidate contact address containers.
    pub address: Vec<String>,
    /// Anchor labels probed first when hunting the documents entry point.
    pub document_link_labels: Vec<String>,
    /// Candidate entry-point links, probed after the label scan.
    pub document_links: Vec<String>,
    /// Element that signals the document listing has rendered.
    pub document_listing_wait: String,
    /// Anchors harvested from the document listing.
    pub attachment_anchors: String,
}

impl Default for SelectorBook {
    fn default() -> Self {
        Self {
            keyword_inputs: vec![
                "input[name=\"search\"]".to_string(),
                "input[type=\"search\"]".to_string(),
                "input[placeholder*=\"Search\"]".to_string(),
                "#searchBox".to_string(),
                ".search-input".to_string(),
            ],
            status_filter_templates: vec![
                "[data-status=\"{status}\"]".to_string(),
                ".status-{slug}".to_string(),
            ],
            clickable_scans: vec!["button".to_string(), "a".to_string()],
            search_form_wait: vec!["form".to_string(), "#searchForm".to_string()],
            form_fields: FormFieldSelectors::default(),
            submit_buttons: vec![
                "button[type=\"submit\"]".to_string(),
                "input[type=\"submit\"]".to_string(),
                "#searchButton".to_string(),
                ".search-button".to_string(),
            ],
            submit_labels: vec!["search".to_string(), "find".to_string()],
            text_input: "input[type=\"text\"]".to_string(),
            listing_wait: "table".to_string(),
            listing_rows: "tbody tr".to_string(),
            title: vec![
                "h1".to_string(),
                "h2".to_string(),
                ".tender-title".to_string(),
                "[class*=\"title\"]".to_string(),
            ],
            description: vec![
                ".description".to_string(),
                "[class*=\"desc\"]".to_string(),
                "div.content".to_string(),
                "p".to_string(),
            ],
            eligibility: vec![
                ".eligibility".to_string(),
                "#eligibility".to_string(),
                "[class*=\"eligib\"]".to_string(),
            ],
            specifications: vec![
                ".specifications".to_string(),
                "#specifications".to_string(),
                "[class*=\"specif\"]".to_string(),
            ],
            terms: vec![
                ".terms".to_string(),
                "#terms".to_string(),
                "[class*=\"condition\"]".to_string(),
            ],
            address: vec![
                ".address".to_string(),
                ".contact-address".to_string(),
                "[class*=\"address\"]".to_string(),
            ],
            document_link_labels: vec![
                "documents".to_string(),
                "attachments".to_string(),
                "download".to_string(),
            ],
            document_links: vec![
                "a[href*=\"document\"]".to_string(),
                "a[href*=\"attachment\"]".to_string(),
            ],
            document_listing_wait: "table, .document-list".to_string(),
            attachment_anchors: "a[href*=\"download\"], a[href*=\".pdf\"]".to_string(),
        }
    }
}

impl SelectorBook {
    /// Renders a status filter template for the given label.
    #[must_use]
    pub fn render_status_template(template: &str, status: &str) -> String {
        let slug = status.to_lowercase().replace(' ', "-");
        template.replace("{status}", status).replace("{slug}", &slug)
    }
}

/// Candidate selectors for each logical search form field, probed in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFieldSelectors {
    /// Keyword input.
    pub keyword: Vec<String>,
    /// Tender id input.
    pub tender_id: Vec<String>,
    /// Organization input.
    pub organization: Vec<String>,
    /// Tender type dropdown.
    pub tender_type: Vec<String>,
    /// Tender status dropdown.
    pub tender_status: Vec<String>,
    /// Publish date range start.
    pub publish_date_from: Vec<String>,
    /// Publish date range end.
    pub publish_date_to: Vec<String>,
    /// Closing date range start.
    pub closing_date_from: Vec<String>,
    /// Closing date range end.
    pub closing_date_to: Vec<String>,
    /// Minimum value input.
    pub min_value: Vec<String>,
    /// Maximum value input.
    pub max_value: Vec<String>,
    /// Location input.
    pub location: Vec<String>,
    /// Category input.
    pub category: Vec<String>,
    /// Department input.
    pub department: Vec<String>,
}

impl Default for FormFieldSelectors {
    fn default() -> Self {
        Self {
            keyword: vec![
                "#keyword".to_string(),
                "input[name*=\"keyword\"]".to_string(),
            ],
            tender_id: vec![
                "#tenderId".to_string(),
                "input[name*=\"tender\"]".to_string(),
            ],
            organization: vec![
                "#organization".to_string(),
                "input[name*=\"org\"]".to_string(),
            ],
            tender_type: vec![
                "#tenderType".to_string(),
                "select[name*=\"type\"]".to_string(),
            ],
            tender_status: vec![
                "#tenderStatus".to_string(),
                "select[name*=\"status\"]".to_string(),
            ],
            publish_date_from: vec![
                "#publishDateFrom".to_string(),
                "input[name*=\"publish\"][name*=\"from\"]".to_string(),
            ],
            publish_date_to: vec![
                "#publishDateTo".to_string(),
                "input[name*=\"publish\"][name*=\"to\"]".to_string(),
            ],
            closing_date_from: vec![
                "#closingDateFrom".to_string(),
                "input[name*=\"closing\"][name*=\"from\"]".to_string(),
            ],
            closing_date_to: vec![
                "#closingDateTo".to_string(),
                "input[name*=\"closing\"][name*=\"to\"]".to_string(),
            ],
            min_value: vec![
                "#minValue".to_string(),
                "input[name*=\"min\"][name*=\"value\"]".to_string(),
            ],
            max_value: vec![
                "#maxValue".to_string(),
                "input[name*=\"max\"][name*=\"value\"]".to_string(),
            ],
            location: vec![
                "#location".to_string(),
                "input[name*=\"location\"]".to_string(),
            ],
            category: vec![
                "#category".to_string(),
                "input[name*=\"category\"]".to_string(),
            ],
            department: vec![
                "#department".to_string(),
                "input[name*=\"department\"]".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScraperConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rate_limit_bounds_enforced() {
        let config = ScraperConfig::new().with_rate_limit(0.05);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field, .. }) if field == "rate_limit_secs"
        ));

        let config = ScraperConfig::new().with_rate_limit(11.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn concurrency_bounds_enforced() {
        let config = ScraperConfig::new().with_concurrency(0);
        assert!(config.validate().is_err());

        let config = ScraperConfig::new().with_concurrency(10);
        assert!(config.validate().is_ok());

        let config = ScraperConfig::new().with_concurrency(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_budget_bounds_enforced() {
        let mut config = ScraperConfig::default();
        config.navigation.max_retries = 10;
        assert!(config.validate().is_ok());

        config.navigation.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn timeout_bounds_enforced() {
        let mut config = ScraperConfig::default();
        config.navigation.timeout_secs = 4;
        assert!(config.validate().is_err());

        config.navigation.timeout_secs = 300;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_base_url_rejected() {
        let config = ScraperConfig::new().with_base_url("  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Empty { field: "base_url" })
        ));
    }

    #[test]
    fn malformed_base_url_rejected() {
        let config = ScraperConfig::new().with_base_url("tender.nprocure.com");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "base_url", .. })
        ));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let nav = NavigationConfig::default();
        assert_eq!(nav.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(nav.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(nav.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn status_template_renders_label_and_slug() {
        let rendered =
            SelectorBook::render_status_template(".status-{slug}", "In Progress");
        assert_eq!(rendered, ".status-in-progress");

        let rendered =
            SelectorBook::render_status_template("[data-status=\"{status}\"]", "Closed");
        assert_eq!(rendered, "[data-status=\"Closed\"]");
    }

    #[test]
    fn selector_book_deserializes_with_defaults() {
        let book: SelectorBook = serde_json::from_str("{}").expect("empty object");
        assert!(!book.keyword_inputs.is_empty());
        assert_eq!(book.listing_rows, "tbody tr");
    }
}
