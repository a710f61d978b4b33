//! Detail page field extraction.
//!
//! The page is parsed once. Labeled table cells are resolved through the
//! ordered rule table in [`rules`](super::rules), content-level regex probes
//! fill whatever the tables did not provide, and script-embedded variables
//! override table figures for value, fee, and EMD. Every sub-extraction is
//! independent: a field that cannot be found leaves its slot empty and
//! never fails the record.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::SelectorBook;
use crate::extract::rules::{apply_rules, parse_tables, DetailField, LABEL_RULES};
use crate::extract::{extract_stages, ClassifierPolicy};
use crate::models::{ContactInfo, TenderRecord};

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal pattern compiles")
}

/// Keywords probed, in order, for a publish date in page text.
const PUBLISH_KEYWORDS: &[&str] = &["publish", "posted", "released"];
/// Keywords probed, in order, for a closing date in page text.
const CLOSING_KEYWORDS: &[&str] = &["closing", "deadline", "last date", "submission"];

/// Cap applied to specifications and terms snippets.
const SNIPPET_CAP: usize = 500;
/// Cap applied to the raw HTML snippet kept on the record.
const RAW_HTML_CAP: usize = 1000;

static SCRIPT_ECV: LazyLock<Regex> = LazyLock::new(|| compiled(r"var ecvvalue\s*=\s*([\d.]+)"));
static SCRIPT_TENDER_FEE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"var tenderfee\s*=\s*([\d.]+)"));
static SCRIPT_EMD: LazyLock<Regex> = LazyLock::new(|| compiled(r"var emdfee\s*=\s*'([^']+)'"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| compiled(r"[\w.\-]+@[\w.\-]+\.\w+"));
static DMY: LazyLock<Regex> = LazyLock::new(|| compiled(r"(\d{2}-\d{2}-\d{4})"));
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| compiled(r"[\d,]+\.?\d*"));

static VALUE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compiled(r"(?i)Estimated.*?Value.*?([\d,]+\.?\d*)"),
        compiled(r"(?i)Contract.*?Value.*?([\d,]+\.?\d*)"),
        compiled(r"(?i)Amount.*?([\d,]+\.?\d*)"),
    ]
});

static IFB_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compiled(r"(?i)IFB[_ ]?No\.?\s*:?\s*([A-Z0-9\-/]+)"),
        compiled(r"(?i)Tender[_ ]?No\.?\s*:?\s*([A-Z0-9\-/]+)"),
        compiled(r"(?i)Notice[_ ]?No\.?\s*:?\s*([A-Z0-9\-/]+)"),
    ]
});

static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compiled(r"\+?\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"),
        compiled(r"\d{10}"),
        compiled(r"\d{3}[-.\s]\d{3}[-.\s]\d{4}"),
    ]
});

static PUBLISH_PROBES: LazyLock<Vec<Regex>> = LazyLock::new(|| date_probes(PUBLISH_KEYWORDS));
static CLOSING_PROBES: LazyLock<Vec<Regex>> = LazyLock::new(|| date_probes(CLOSING_KEYWORDS));

fn date_probes(keywords: &[&str]) -> Vec<Regex> {
    keywords
        .iter()
        .map(|kw| compiled(&format!(r"(?i){}.*?(\d{{2}}-\d{{2}}-\d{{4}})", regex::escape(kw))))
        .collect()
}

/// Extracts [`TenderRecord`]s from detail pages.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    selectors: SelectorBook,
    classifier: ClassifierPolicy,
}

impl DetailExtractor {
    /// Creates an extractor over the given selector book and classifier.
    #[must_use]
    pub fn new(selectors: SelectorBook, classifier: ClassifierPolicy) -> Self {
        Self {
            selectors,
            classifier,
        }
    }

    /// Extracts a record from a detail page.
    ///
    /// Always yields a record; fields that cannot be resolved fall back to
    /// placeholders or stay empty.
    #[must_use]
    pub fn extract(&self, html: &str, tender_id: &str, source_url: &str) -> TenderRecord {
        let doc = Html::parse_document(html);
        let labeled = apply_rules(&parse_tables(&doc), LABEL_RULES);

        let title = super::probe_first_text(&doc, &self.selectors.title);
        let organization = labeled.get(&DetailField::Organization).cloned();
        let description = self.description(&doc);

        // Classification sees fields as found; placeholders are applied to
        // the record afterwards.
        let tender_type = self.classifier.classify_type(
            title.as_deref().unwrap_or(""),
            organization.as_deref().unwrap_or(""),
            description.as_deref().unwrap_or(""),
        );

        let mut record = TenderRecord::new(tender_id);
        if let Some(title) = title {
            record.title = title;
        }
        if let Some(organization) = organization {
            record.organization = organization;
        }
        record.tender_type = tender_type;
        record.tender_status = self.classifier.classify_status(html);
        record.description = description;
        record.publish_date = date_field(&labeled, DetailField::PublishDate, &PUBLISH_PROBES, html);
        record.closing_date = date_field(&labeled, DetailField::ClosingDate, &CLOSING_PROBES, html);
        record.estimated_value = script_float(&SCRIPT_ECV, html).or_else(|| {
            labeled
                .get(&DetailField::EstimatedValue)
                .and_then(|cell| parse_amount(cell))
                .or_else(|| scan_value(html))
        });
        record.tender_fee = script_float(&SCRIPT_TENDER_FEE, html).or_else(|| {
            labeled
                .get(&DetailField::TenderFee)
                .and_then(|cell| parse_amount(cell))
        });
        record.emd = SCRIPT_EMD
            .captures(html)
            .map(|caps| caps[1].to_string())
            .or_else(|| labeled.get(&DetailField::Emd).cloned());
        record.ifb_number = scan_ifb(html);
        record.location = labeled.get(&DetailField::Location).cloned();
        record.department = labeled.get(&DetailField::Department).cloned();
        record.category = labeled.get(&DetailField::Category).cloned();
        record.inviting_authority = labeled.get(&DetailField::InvitingAuthority).cloned();
        record.eligibility = super::probe_long_text(&doc, &self.selectors.eligibility, None);
        record.specifications =
            super::probe_long_text(&doc, &self.selectors.specifications, Some(SNIPPET_CAP));
        record.terms = super::probe_long_text(&doc, &self.selectors.terms, Some(SNIPPET_CAP));
        record.contact = self.contact(&doc, html);
        record.stages = extract_stages(&doc);
        record.source_url = Some(source_url.to_string());
        record.raw_html_snippet = Some(html.chars().take(RAW_HTML_CAP).collect());

        debug!(
            tender_id,
            labeled_fields = labeled.len(),
            stages = record.stages.len(),
            "extracted detail record"
        );
        record
    }

    /// Joins up to five long-enough blocks from the first description
    /// selector that yields any.
    fn description(&self, doc: &Html) -> Option<String> {
        for css in &self.selectors.description {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            let blocks: Vec<String> = doc
                .select(&selector)
                .take(5)
                .map(super::collapsed_text)
                .filter(|text| text.chars().count() > 20)
                .collect();
            if !blocks.is_empty() {
                return Some(blocks.join(" "));
            }
        }
        None
    }

    fn contact(&self, doc: &Html, html: &str) -> Option<ContactInfo> {
        let contact = ContactInfo {
            email: EMAIL.find(html).map(|m| m.as_str().to_string()),
            phone: PHONE_PATTERNS
                .iter()
                .find_map(|pattern| pattern.find(html))
                .map(|m| m.as_str().to_string()),
            address: self.address(doc),
        };
        (!contact.is_empty()).then_some(contact)
    }

    /// An address must be substantial but still look like an address, not a
    /// whole page section.
    fn address(&self, doc: &Html) -> Option<String> {
        for css in &self.selectors.address {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            if let Some(element) = doc.select(&selector).next() {
                let text = super::collapsed_text(element);
                let chars = text.chars().count();
                if chars > 10 && chars < 200 {
                    return Some(text);
                }
            }
        }
        None
    }
}

/// Resolves a date field: a labeled table cell wins, rearranged to ISO when
/// it carries a `dd-mm-yyyy`, otherwise kept as printed; content probes are
/// the fallback.
fn date_field(
    labeled: &HashMap<DetailField, String>,
    field: DetailField,
    probes: &[Regex],
    html: &str,
) -> Option<String> {
    if let Some(cell) = labeled.get(&field) {
        if let Some(caps) = DMY.captures(cell) {
            return super::rearrange_dmy(&caps[1]);
        }
        return Some(cell.clone());
    }
    probes
        .iter()
        .find_map(|probe| probe.captures(html))
        .and_then(|caps| super::rearrange_dmy(&caps[1]))
}

/// First parseable number in the text, commas stripped.
fn parse_amount(text: &str) -> Option<f64> {
    NUMERIC
        .find_iter(text)
        .find_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

fn scan_value(html: &str) -> Option<f64> {
    VALUE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(html)
            .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
    })
}

fn scan_ifb(html: &str) -> Option<String> {
    IFB_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(html))
        .map(|caps| caps[1].trim().to_string())
}

fn script_float(pattern: &Regex, html: &str) -> Option<f64> {
    pattern
        .captures(html)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}
