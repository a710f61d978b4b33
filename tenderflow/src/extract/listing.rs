//! Listing table extraction.
//!
//! The start page renders tenders as table rows of three cells: an IFB
//! reference, a detail block with the tender link, and a document summary.
//! Rows are parsed independently; anything that does not yield a tender id
//! is skipped rather than failing the page.

use crate::config::SelectorBook;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static TENDER_ID: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"(?i)Tender[_ ]?Id[:\s]+(\d+)"));
static ORG_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    compiled(r#"(?i)<span[^>]*style="[^"]*color:#f44336[^"]*"[^>]*>([^<]+)"#)
});
static ORG_BEFORE_FORM: LazyLock<Regex> = LazyLock::new(|| compiled(r"(?i)>([^<]+)<form"));
static WORK_NAME: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"(?i)Name Of Work\s*:</strong>([^<]+)"));
static CONTRACT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"(?i)Estimated Contract Value\s*:\s*([\d,]+\.?\d*)"));
static CLOSING_DATE: LazyLock<Regex> =
    LazyLock::new(|| compiled(r"(?i)Last Date.*?Submission\s*:\s*(\d{2}-\d{2}-\d{4})"));
static DOC_COUNT: LazyLock<Regex> = LazyLock::new(|| compiled(r"Total No:(\d+)"));

/// Longest raw snippet kept per row, in characters.
const SNIPPET_CAP: usize = 500;

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal pattern compiles")
}

/// One raw candidate parsed from a listing row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRow {
    /// Tender id parsed from the detail block.
    pub tender_id: String,
    /// IFB reference from the first cell.
    pub ifb_number: Option<String>,
    /// Name of work, when the row prints one.
    pub title: Option<String>,
    /// Issuing organization, when the row prints one.
    pub organization: Option<String>,
    /// Estimated contract value from the row text.
    pub estimated_value: Option<f64>,
    /// Submission deadline, rearranged to ISO.
    pub closing_date: Option<String>,
    /// Advertised document count from the third cell.
    pub document_count: Option<u32>,
    /// Href of the detail link, as printed (possibly relative).
    pub detail_href: Option<String>,
    /// Raw detail-block markup kept for debugging.
    pub raw_html: String,
}

/// Parses the listing table into candidate rows.
///
/// Rows with fewer than three cells, or from which no tender id can be
/// read, yield nothing; the extracted set may be a strict subset of the
/// rendered rows.
#[must_use]
pub fn extract_listing(html: &str, selectors: &SelectorBook) -> Vec<ListingRow> {
    let doc = Html::parse_document(html);
    let Ok(row_selector) = Selector::parse(&selectors.listing_rows) else {
        warn!(selector = %selectors.listing_rows, "listing row selector did not parse");
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut scanned = 0usize;
    for row in doc.select(&row_selector) {
        scanned += 1;
        if let Some(candidate) = extract_row(row) {
            rows.push(candidate);
        } else {
            debug!(row = scanned, "listing row skipped");
        }
    }
    info!(found = rows.len(), scanned, "extracted tender listing");
    rows
}

fn extract_row(row: ElementRef<'_>) -> Option<ListingRow> {
    let cell_sel = super::literal_selector("td");
    let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
    if cells.len() < 3 {
        return None;
    }

    let ifb_number = super::collapsed_text(cells[0]);
    let details_html = cells[1].inner_html();
    let doc_html = cells[2].inner_html();

    let tender_id = TENDER_ID
        .captures(&details_html)
        .map(|caps| caps[1].to_string())?;

    Some(ListingRow {
        tender_id,
        ifb_number: (!ifb_number.is_empty()).then_some(ifb_number),
        title: extract_title(&details_html),
        organization: extract_organization(&details_html),
        estimated_value: extract_value(&details_html),
        closing_date: extract_closing_date(&details_html),
        document_count: extract_document_count(&doc_html),
        detail_href: extract_detail_href(cells[1]),
        raw_html: details_html.chars().take(SNIPPET_CAP).collect(),
    })
}

fn extract_title(details_html: &str) -> Option<String> {
    WORK_NAME
        .captures(details_html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|title| !title.is_empty())
}

fn extract_organization(details_html: &str) -> Option<String> {
    if let Some(caps) = ORG_SPAN.captures(details_html) {
        let text = caps[1].trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }
    if let Some(caps) = ORG_BEFORE_FORM.captures(details_html) {
        let text = caps[1].trim();
        if text.len() > 3 && !text.to_lowercase().contains("tender") {
            return Some(text.to_string());
        }
    }
    None
}

fn extract_value(details_html: &str) -> Option<f64> {
    let caps = CONTRACT_VALUE.captures(details_html)?;
    caps[1].replace(',', "").parse().ok()
}

fn extract_closing_date(details_html: &str) -> Option<String> {
    let caps = CLOSING_DATE.captures(details_html)?;
    super::rearrange_dmy(&caps[1])
}

fn extract_document_count(doc_html: &str) -> Option<u32> {
    let caps = DOC_COUNT.captures(doc_html)?;
    caps[1].parse().ok()
}

/// Picks the anchor leading to the detail page.
///
/// The anchor printing the tender id is preferred; any anchor with an href
/// is accepted as fallback.
fn extract_detail_href(details_cell: ElementRef<'_>) -> Option<String> {
    let anchor_sel = super::literal_selector("a[href]");
    let anchors: Vec<ElementRef<'_>> = details_cell.select(&anchor_sel).collect();

    for anchor in &anchors {
        let text = super::collapsed_text(*anchor).to_lowercase();
        if text.contains("tender id") {
            if let Some(href) = anchor.value().attr("href") {
                return Some(href.to_string());
            }
        }
    }
    anchors
        .first()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn listing_html(rows: &str) -> String {
        format!("<html><body><table><tbody>{rows}</tbody></table></body></html>")
    }

    const FULL_ROW: &str = r##"<tr>
        <td> IFB/2026/0042 </td>
        <td>
          <a href="/view-nit-home?id=271843">Tender Id :271843</a>
          <span style="font-weight:bold;color:#f44336;">Roads and Buildings, Rajkot</span>
          <strong>Name Of Work :</strong>Widening of approach road<br>
          Estimated Contract Value : 43,19,999.50<br>
          Last Date &amp; Time of Submission : 10-02-2026
          <form action="/x"></form>
        </td>
        <td>Total No:12</td>
    </tr>"##;

    #[test]
    fn full_row_parses_every_field() {
        let html = listing_html(FULL_ROW);
        let rows = extract_listing(&html, &SelectorBook::default());

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.tender_id, "271843");
        assert_eq!(row.ifb_number.as_deref(), Some("IFB/2026/0042"));
        assert_eq!(row.title.as_deref(), Some("Widening of approach road"));
        assert_eq!(row.organization.as_deref(), Some("Roads and Buildings, Rajkot"));
        assert_eq!(row.estimated_value, Some(4_319_999.5));
        assert_eq!(row.closing_date.as_deref(), Some("2026-02-10"));
        assert_eq!(row.document_count, Some(12));
        assert_eq!(row.detail_href.as_deref(), Some("/view-nit-home?id=271843"));
        assert!(row.raw_html.contains("Name Of Work"));
    }

    #[test]
    fn short_rows_are_skipped() {
        let html = listing_html("<tr><td>only</td><td>two cells</td></tr>");
        let rows = extract_listing(&html, &SelectorBook::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn rows_without_a_tender_id_are_skipped() {
        let html = listing_html(
            "<tr><td>IFB/1</td><td>No id printed here</td><td>Total No:3</td></tr>",
        );
        let rows = extract_listing(&html, &SelectorBook::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn skipping_one_row_keeps_the_others() {
        let rows_html = format!(
            "{FULL_ROW}<tr><td>bad</td></tr>\
             <tr><td>IFB/2</td><td><a href=\"/d?id=9\">Tender_Id: 9</a></td><td></td></tr>"
        );
        let html = listing_html(&rows_html);
        let rows = extract_listing(&html, &SelectorBook::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tender_id, "271843");
        assert_eq!(rows[1].tender_id, "9");
        assert_eq!(rows[1].document_count, None);
    }

    #[test]
    fn organization_falls_back_to_text_before_form() {
        let html = listing_html(
            r#"<tr><td>IFB/3</td>
            <td><a href="/d?id=5">Tender Id :5</a>Water Supply Board<form></form></td>
            <td>Total No:1</td></tr>"#,
        );
        let rows = extract_listing(&html, &SelectorBook::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].organization.as_deref(), Some("Water Supply Board"));
    }
}
