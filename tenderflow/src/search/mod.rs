//! Portal search with three degrading strategies.
//!
//! Every portal revision moves the search controls around, so each
//! strategy probes an ordered selector chain and quietly steps down to
//! the next one: quick keyword box, status filter controls, then the
//! advanced search form. A search that finds no purchase anywhere is
//! reported, not raised; the pipeline continues over the unfiltered
//! listing.

use async_trait::async_trait;
use chromiumoxide::Page;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::{NavigationSurface, Navigator};
use crate::config::SelectorBook;
use crate::models::{TenderStatus, TenderType};

/// Buttons are the only elements scanned for submit labels.
const SUBMIT_LABEL_SCAN: &str = "button";

/// Criteria for narrowing the tender listing.
///
/// Every field is optional; [`SearchFilters::has_filters`] reports
/// whether anything was requested at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    /// Keyword searched in titles and descriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Exact tender id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tender_id: Option<String>,
    /// Inviting organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Procurement type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tender_type: Option<TenderType>,
    /// Lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tender_status: Option<TenderStatus>,
    /// Earliest publish date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date_from: Option<NaiveDate>,
    /// Latest publish date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date_to: Option<NaiveDate>,
    /// Earliest closing date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_date_from: Option<NaiveDate>,
    /// Latest closing date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_date_to: Option<NaiveDate>,
    /// Minimum estimated value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Maximum estimated value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Work or supply location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Tender category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Issuing department.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl SearchFilters {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keyword searched in tender titles and descriptions.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Sets the organization filter.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Sets the tender type filter.
    #[must_use]
    pub const fn with_tender_type(mut self, tender_type: TenderType) -> Self {
        self.tender_type = Some(tender_type);
        self
    }

    /// Sets the tender status filter.
    #[must_use]
    pub const fn with_status(mut self, status: TenderStatus) -> Self {
        self.tender_status = Some(status);
        self
    }

    /// Sets the minimum estimated value.
    #[must_use]
    pub const fn with_min_value(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    /// Sets the maximum estimated value.
    #[must_use]
    pub const fn with_max_value(mut self, value: f64) -> Self {
        self.max_value = Some(value);
        self
    }

    /// Whether any criterion is set.
    #[must_use]
    pub const fn has_filters(&self) -> bool {
        self.keyword.is_some()
            || self.tender_id.is_some()
            || self.organization.is_some()
            || self.tender_type.is_some()
            || self.tender_status.is_some()
            || self.publish_date_from.is_some()
            || self.publish_date_to.is_some()
            || self.closing_date_from.is_some()
            || self.closing_date_to.is_some()
            || self.min_value.is_some()
            || self.max_value.is_some()
            || self.location.is_some()
            || self.category.is_some()
            || self.department.is_some()
    }
}

/// The strategy that ultimately ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Keyword typed into a quick-search box.
    Simple,
    /// A status filter control was clicked.
    StatusFilter,
    /// The advanced search form was filled and submitted.
    FullForm,
}

/// What a search attempt accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// The strategy that ran last.
    pub mode: SearchMode,
    /// Whether the filter actually took effect.
    pub applied: bool,
}

impl SearchOutcome {
    const fn applied(mode: SearchMode) -> Self {
        Self {
            mode,
            applied: true,
        }
    }

    const fn missed(mode: SearchMode) -> Self {
        Self {
            mode,
            applied: false,
        }
    }
}

/// Form interaction primitives of a rendering surface.
///
/// Each probe reports `Ok(false)` when no element matched the selector,
/// so callers can continue down their fallback chains, and `Err` when
/// the element was found but the interaction failed.
#[async_trait]
pub trait FormSurface: Send + Sync {
    /// Clears and types into the first element matching `selector`.
    async fn fill_text(&self, selector: &str, value: &str) -> Result<bool, String>;

    /// Sets the value of the first `<select>` matching `selector`.
    async fn select_value(&self, selector: &str, value: &str) -> Result<bool, String>;

    /// Clicks the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<bool, String>;

    /// Clicks the first element under `scan` whose text contains
    /// `needle`, case-insensitively.
    async fn click_matching_text(&self, scan: &str, needle: &str) -> Result<bool, String>;

    /// Presses Enter on the first element matching `selector`.
    async fn press_enter(&self, selector: &str) -> Result<bool, String>;

    /// The URL currently loaded, when known.
    async fn current_url(&self) -> Option<String>;
}

#[async_trait]
impl FormSurface for Page {
    async fn fill_text(&self, selector: &str, value: &str) -> Result<bool, String> {
        let Ok(element) = self.find_element(selector).await else {
            return Ok(false);
        };
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(|e| e.to_string())?;
        element.type_str(value).await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<bool, String> {
        let Ok(element) = self.find_element(selector).await else {
            return Ok(false);
        };
        let literal = serde_json::to_string(value).map_err(|e| e.to_string())?;
        let set_and_notify = format!(
            "function() {{ this.value = {literal}; \
             this.dispatchEvent(new Event('change', {{ bubbles: true }})); }}"
        );
        element
            .call_js_fn(set_and_notify, false)
            .await
            .map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn click(&self, selector: &str) -> Result<bool, String> {
        let Ok(element) = self.find_element(selector).await else {
            return Ok(false);
        };
        element.click().await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn click_matching_text(&self, scan: &str, needle: &str) -> Result<bool, String> {
        let elements = self.find_elements(scan).await.map_err(|e| e.to_string())?;
        let needle = needle.to_lowercase();
        for element in elements {
            let Ok(Some(text)) = element.inner_text().await else {
                continue;
            };
            if text.to_lowercase().contains(&needle) {
                element.click().await.map_err(|e| e.to_string())?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn press_enter(&self, selector: &str) -> Result<bool, String> {
        let Ok(element) = self.find_element(selector).await else {
            return Ok(false);
        };
        element.press_key("Enter").await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn current_url(&self) -> Option<String> {
        self.url().await.ok().flatten()
    }
}

/// Runs searches against a portal surface.
#[derive(Debug, Clone)]
pub struct SearchController {
    base_url: String,
    selectors: SelectorBook,
    navigator: Navigator,
}

impl SearchController {
    /// Creates a controller for the portal at `base_url`.
    pub fn new(base_url: impl Into<String>, selectors: SelectorBook, navigator: Navigator) -> Self {
        Self {
            base_url: base_url.into(),
            selectors,
            navigator,
        }
    }

    /// Types `keyword` into the first quick-search box and submits it.
    ///
    /// Degrades to [`Self::advanced_search`] when no quick-search box
    /// exists on the page.
    pub async fn simple_search<S>(&self, surface: &S, keyword: &str) -> SearchOutcome
    where
        S: FormSurface + NavigationSurface + ?Sized,
    {
        info!(keyword, "performing simple search");

        for selector in &self.selectors.keyword_inputs {
            match surface.fill_text(selector, keyword).await {
                Ok(true) => match surface.press_enter(selector).await {
                    Ok(true) => {
                        info!(keyword, selector, "simple search submitted");
                        return SearchOutcome::applied(SearchMode::Simple);
                    }
                    Ok(false) => {}
                    Err(cause) => debug!(selector, %cause, "submit failed on quick-search box"),
                },
                Ok(false) => {}
                Err(cause) => debug!(selector, %cause, "quick-search probe failed"),
            }
        }

        debug!(keyword, "no quick-search box found; degrading to the full form");
        let filters = SearchFilters::new().with_keyword(keyword);
        self.advanced_search(surface, &filters).await
    }

    /// Clicks a status filter control matching `status`.
    ///
    /// Scans clickable elements by text first, then tries the rendered
    /// selector templates, and finally degrades to the full form.
    pub async fn filter_by_status<S>(&self, surface: &S, status: TenderStatus) -> SearchOutcome
    where
        S: FormSurface + NavigationSurface + ?Sized,
    {
        let label = status.label();
        info!(status = label, "filtering by tender status");

        for scan in &self.selectors.clickable_scans {
            match surface.click_matching_text(scan, label).await {
                Ok(true) => {
                    info!(status = label, scan, "status filter clicked");
                    return SearchOutcome::applied(SearchMode::StatusFilter);
                }
                Ok(false) => {}
                Err(cause) => debug!(scan, %cause, "status text scan failed"),
            }
        }

        for template in &self.selectors.status_filter_templates {
            let selector = SelectorBook::render_status_template(template, label);
            match surface.click(&selector).await {
                Ok(true) => {
                    info!(status = label, selector, "status filter clicked");
                    return SearchOutcome::applied(SearchMode::StatusFilter);
                }
                Ok(false) => {}
                Err(cause) => debug!(selector, %cause, "status selector probe failed"),
            }
        }

        debug!(status = label, "no status control found; degrading to the full form");
        let filters = SearchFilters::new().with_status(status);
        self.advanced_search(surface, &filters).await
    }

    /// Fills and submits the advanced search form.
    ///
    /// Navigates to the search page first when the surface is somewhere
    /// else. Individual fields that find no input are skipped; the
    /// outcome reports whether the form was actually submitted.
    pub async fn advanced_search<S>(&self, surface: &S, filters: &SearchFilters) -> SearchOutcome
    where
        S: FormSurface + NavigationSurface + ?Sized,
    {
        debug!(?filters, "performing advanced search");

        let on_search_page = surface
            .current_url()
            .await
            .is_some_and(|url| url.contains("/advanced-search"));
        if !on_search_page {
            let search_url = format!("{}/advanced-search", self.base_url);
            if !self.navigator.goto(surface, &search_url).await.is_success() {
                warn!(url = %search_url, "advanced search page unreachable; listing stays unfiltered");
                return SearchOutcome::missed(SearchMode::FullForm);
            }
        }

        let form_wait = self.selectors.search_form_wait.join(", ");
        if !self.navigator.wait_for_selector(surface, &form_wait).await {
            warn!("search form never appeared; listing stays unfiltered");
            return SearchOutcome::missed(SearchMode::FullForm);
        }

        self.fill_form(surface, filters).await;

        if self.submit(surface).await {
            info!("advanced search submitted");
            SearchOutcome::applied(SearchMode::FullForm)
        } else {
            warn!("no submit control found; listing stays unfiltered");
            SearchOutcome::missed(SearchMode::FullForm)
        }
    }

    async fn fill_form<S>(&self, surface: &S, filters: &SearchFilters)
    where
        S: FormSurface + ?Sized,
    {
        let fields = &self.selectors.form_fields;

        if let Some(keyword) = &filters.keyword {
            self.fill_first(surface, "keyword", &fields.keyword, keyword)
                .await;
        }
        if let Some(tender_id) = &filters.tender_id {
            self.fill_first(surface, "tender_id", &fields.tender_id, tender_id)
                .await;
        }
        if let Some(organization) = &filters.organization {
            self.fill_first(surface, "organization", &fields.organization, organization)
                .await;
        }
        if let Some(tender_type) = filters.tender_type {
            self.select_first(surface, "tender_type", &fields.tender_type, tender_type.label())
                .await;
        }
        if let Some(status) = filters.tender_status {
            self.select_first(surface, "tender_status", &fields.tender_status, status.label())
                .await;
        }
        if let Some(date) = filters.publish_date_from {
            self.fill_first(
                surface,
                "publish_date_from",
                &fields.publish_date_from,
                &format_filter_date(date),
            )
            .await;
        }
        if let Some(date) = filters.publish_date_to {
            self.fill_first(
                surface,
                "publish_date_to",
                &fields.publish_date_to,
                &format_filter_date(date),
            )
            .await;
        }
        if let Some(date) = filters.closing_date_from {
            self.fill_first(
                surface,
                "closing_date_from",
                &fields.closing_date_from,
                &format_filter_date(date),
            )
            .await;
        }
        if let Some(date) = filters.closing_date_to {
            self.fill_first(
                surface,
                "closing_date_to",
                &fields.closing_date_to,
                &format_filter_date(date),
            )
            .await;
        }
        if let Some(min_value) = filters.min_value {
            self.fill_first(surface, "min_value", &fields.min_value, &min_value.to_string())
                .await;
        }
        if let Some(max_value) = filters.max_value {
            self.fill_first(surface, "max_value", &fields.max_value, &max_value.to_string())
                .await;
        }
        if let Some(location) = &filters.location {
            self.fill_first(surface, "location", &fields.location, location)
                .await;
        }
        if let Some(category) = &filters.category {
            self.fill_first(surface, "category", &fields.category, category)
                .await;
        }
        if let Some(department) = &filters.department {
            self.fill_first(surface, "department", &fields.department, department)
                .await;
        }
    }

    async fn fill_first<S>(&self, surface: &S, field: &'static str, selectors: &[String], value: &str)
    where
        S: FormSurface + ?Sized,
    {
        for selector in selectors {
            match surface.fill_text(selector, value).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(cause) => debug!(field, selector, %cause, "field probe failed"),
            }
        }
        debug!(field, "no input matched any candidate selector");
    }

    async fn select_first<S>(&self, surface: &S, field: &'static str, selectors: &[String], value: &str)
    where
        S: FormSurface + ?Sized,
    {
        for selector in selectors {
            match surface.select_value(selector, value).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(cause) => debug!(field, selector, %cause, "dropdown probe failed"),
            }
        }
        debug!(field, "no dropdown matched any candidate selector");
    }

    /// Submit chain: candidate buttons, then a button text scan, then
    /// Enter on the first text input.
    async fn submit<S>(&self, surface: &S) -> bool
    where
        S: FormSurface + ?Sized,
    {
        for selector in &self.selectors.submit_buttons {
            match surface.click(selector).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(cause) => debug!(selector, %cause, "submit probe failed"),
            }
        }

        for label in &self.selectors.submit_labels {
            match surface.click_matching_text(SUBMIT_LABEL_SCAN, label).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(cause) => debug!(label, %cause, "submit label scan failed"),
            }
        }

        match surface.press_enter(&self.selectors.text_input).await {
            Ok(true) => {
                debug!("form submitted via Enter on the first text input");
                true
            }
            Ok(false) => false,
            Err(cause) => {
                debug!(%cause, "Enter fallback failed");
                false
            }
        }
    }
}

/// Dates travel through the form in day-month-year order.
fn format_filter_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};

    use crate::config::NavigationConfig;

    #[derive(Default)]
    struct FakePortal {
        url: String,
        present: HashSet<String>,
        texts_by_scan: HashMap<String, Vec<String>>,
        actions: Mutex<Vec<String>>,
    }

    impl FakePortal {
        fn new(url: &str) -> Self {
            Self {
                url: url.to_string(),
                ..Self::default()
            }
        }

        fn with_elements(mut self, selectors: &[&str]) -> Self {
            self.present = selectors.iter().map(ToString::to_string).collect();
            self
        }

        fn with_texts(mut self, scan: &str, texts: &[&str]) -> Self {
            self.texts_by_scan
                .insert(scan.to_string(), texts.iter().map(ToString::to_string).collect());
            self
        }

        fn actions(&self) -> Vec<String> {
            self.actions.lock().clone()
        }
    }

    #[async_trait]
    impl FormSurface for FakePortal {
        async fn fill_text(&self, selector: &str, value: &str) -> Result<bool, String> {
            if !self.present.contains(selector) {
                return Ok(false);
            }
            self.actions.lock().push(format!("fill {selector} = {value}"));
            Ok(true)
        }

        async fn select_value(&self, selector: &str, value: &str) -> Result<bool, String> {
            if !self.present.contains(selector) {
                return Ok(false);
            }
            self.actions.lock().push(format!("select {selector} = {value}"));
            Ok(true)
        }

        async fn click(&self, selector: &str) -> Result<bool, String> {
            if !self.present.contains(selector) {
                return Ok(false);
            }
            self.actions.lock().push(format!("click {selector}"));
            Ok(true)
        }

        async fn click_matching_text(&self, scan: &str, needle: &str) -> Result<bool, String> {
            let needle = needle.to_lowercase();
            let hit = self
                .texts_by_scan
                .get(scan)
                .is_some_and(|texts| texts.iter().any(|t| t.to_lowercase().contains(&needle)));
            if hit {
                self.actions.lock().push(format!("click-text {scan} ~ {needle}"));
            }
            Ok(hit)
        }

        async fn press_enter(&self, selector: &str) -> Result<bool, String> {
            if !self.present.contains(selector) {
                return Ok(false);
            }
            self.actions.lock().push(format!("enter {selector}"));
            Ok(true)
        }

        async fn current_url(&self) -> Option<String> {
            Some(self.url.clone())
        }
    }

    #[async_trait]
    impl NavigationSurface for FakePortal {
        async fn navigate(&self, url: &str) -> Result<Option<i64>, String> {
            self.actions.lock().push(format!("goto {url}"));
            Ok(Some(200))
        }

        async fn element_exists(&self, selector: &str) -> bool {
            selector
                .split(", ")
                .any(|candidate| self.present.contains(candidate))
        }
    }

    fn controller() -> SearchController {
        SearchController::new(
            "https://portal.example",
            SelectorBook::default(),
            Navigator::new(NavigationConfig {
                backoff_base_secs: 0.001,
                ..NavigationConfig::default()
            }),
        )
    }

    #[tokio::test]
    async fn simple_search_uses_the_first_matching_box() {
        let portal = FakePortal::new("https://portal.example/")
            .with_elements(&["input[type=\"search\"]"]);

        let outcome = controller().simple_search(&portal, "road work").await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::Simple));
        assert_eq!(
            portal.actions(),
            vec![
                "fill input[type=\"search\"] = road work".to_string(),
                "enter input[type=\"search\"]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn simple_search_degrades_to_the_full_form() {
        let portal = FakePortal::new("https://portal.example/")
            .with_elements(&["form", "#keyword", "button[type=\"submit\"]"]);

        let outcome = controller().simple_search(&portal, "bridge").await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::FullForm));
        assert_eq!(
            portal.actions(),
            vec![
                "goto https://portal.example/advanced-search".to_string(),
                "fill #keyword = bridge".to_string(),
                "click button[type=\"submit\"]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn status_filter_prefers_buttons_over_anchors() {
        let portal = FakePortal::new("https://portal.example/")
            .with_texts("button", &["Show Awarded Tenders"])
            .with_texts("a", &["Awarded archive"]);

        let outcome = controller().filter_by_status(&portal, TenderStatus::Awarded).await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::StatusFilter));
        assert_eq!(portal.actions(), vec!["click-text button ~ awarded".to_string()]);
    }

    #[tokio::test]
    async fn status_filter_falls_back_to_rendered_templates() {
        let portal = FakePortal::new("https://portal.example/")
            .with_elements(&[".status-in-progress"]);

        let outcome = controller()
            .filter_by_status(&portal, TenderStatus::InProgress)
            .await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::StatusFilter));
        assert_eq!(portal.actions(), vec!["click .status-in-progress".to_string()]);
    }

    #[tokio::test]
    async fn advanced_search_formats_dates_and_selects_dropdowns() {
        let portal = FakePortal::new("https://portal.example/advanced-search")
            .with_elements(&["#searchForm", "#publishDateFrom", "#tenderType", "#searchButton"]);

        let filters = SearchFilters::new().with_tender_type(TenderType::Works);
        let filters = SearchFilters {
            publish_date_from: NaiveDate::from_ymd_opt(2026, 2, 1),
            ..filters
        };
        let outcome = controller().advanced_search(&portal, &filters).await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::FullForm));
        assert_eq!(
            portal.actions(),
            vec![
                "select #tenderType = Works".to_string(),
                "fill #publishDateFrom = 01-02-2026".to_string(),
                "click #searchButton".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn submit_falls_back_to_enter_on_a_text_input() {
        let portal = FakePortal::new("https://portal.example/advanced-search")
            .with_elements(&["form", "#keyword", "input[type=\"text\"]"]);

        let filters = SearchFilters::new().with_keyword("canal");
        let outcome = controller().advanced_search(&portal, &filters).await;

        assert_eq!(outcome, SearchOutcome::applied(SearchMode::FullForm));
        assert_eq!(
            portal.actions(),
            vec![
                "fill #keyword = canal".to_string(),
                "enter input[type=\"text\"]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_submit_controls_report_an_unapplied_search() {
        let portal = FakePortal::new("https://portal.example/advanced-search")
            .with_elements(&["form"]);

        let outcome = controller()
            .advanced_search(&portal, &SearchFilters::new().with_keyword("dam"))
            .await;

        assert_eq!(outcome, SearchOutcome::missed(SearchMode::FullForm));
    }

    #[test]
    fn empty_filters_report_nothing_to_apply() {
        assert!(!SearchFilters::new().has_filters());
        assert!(SearchFilters::new().with_keyword("x").has_filters());
        assert!(SearchFilters::new().with_min_value(1000.0).has_filters());
    }
}
