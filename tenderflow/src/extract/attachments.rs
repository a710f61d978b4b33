//! Attachment link discovery and harvesting.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::SelectorBook;
use crate::models::Attachment;

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal pattern compiles")
}

/// Trailing extension of a URL path, before any query string.
static FILE_TYPE: LazyLock<Regex> = LazyLock::new(|| compiled(r"\.([a-zA-Z0-9]+)(?:\?|$)"));

/// Finds document listings from detail pages and harvests their links.
#[derive(Debug, Clone)]
pub struct AttachmentExtractor {
    base: Url,
    selectors: SelectorBook,
}

impl AttachmentExtractor {
    /// Creates an extractor that absolutizes links against `base`.
    #[must_use]
    pub fn new(base: Url, selectors: SelectorBook) -> Self {
        Self { base, selectors }
    }

    /// Finds the link leading from a detail page to its document listing.
    ///
    /// Anchors whose visible text mentions a configured label are probed
    /// first, in label order; href-substring candidates only run when no
    /// label matches anywhere.
    #[must_use]
    pub fn find_document_link(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let anchors = super::literal_selector("a[href]");

        for label in &self.selectors.document_link_labels {
            let label = label.to_lowercase();
            for anchor in doc.select(&anchors) {
                if !super::collapsed_text(anchor).to_lowercase().contains(&label) {
                    continue;
                }
                if let Some(url) = anchor.value().attr("href").and_then(|h| self.absolutize(h)) {
                    return Some(url);
                }
            }
        }

        for css in &self.selectors.document_links {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            for anchor in doc.select(&selector) {
                if let Some(url) = anchor.value().attr("href").and_then(|h| self.absolutize(h)) {
                    return Some(url);
                }
            }
        }
        None
    }

    /// Harvests attachments from a document listing page.
    ///
    /// Nameless anchors get a `Document_{n}` placeholder; the file type is
    /// derived from the URL's extension and defaults to `unknown`.
    #[must_use]
    pub fn parse_listing(&self, html: &str) -> Vec<Attachment> {
        let doc = Html::parse_document(html);
        let Ok(anchors) = Selector::parse(&self.selectors.attachment_anchors) else {
            warn!(
                selector = %self.selectors.attachment_anchors,
                "attachment anchor selector does not parse"
            );
            return Vec::new();
        };

        let mut attachments = Vec::new();
        for anchor in doc.select(&anchors) {
            let Some(url) = anchor.value().attr("href").and_then(|h| self.absolutize(h)) else {
                continue;
            };

            let name = super::collapsed_text(anchor);
            let name = if name.is_empty() {
                format!("Document_{}", attachments.len() + 1)
            } else {
                name
            };

            let file_type = FILE_TYPE.captures(&url).map(|caps| caps[1].to_lowercase());
            let mut attachment = Attachment::new(name, url);
            if let Some(file_type) = file_type {
                attachment = attachment.with_file_type(file_type);
            }
            attachments.push(attachment);
        }

        debug!(count = attachments.len(), "harvested attachment links");
        attachments
    }

    fn absolutize(&self, href: &str) -> Option<String> {
        if href.starts_with("http") {
            return Some(href.to_string());
        }
        self.base.join(href).ok().map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extractor() -> AttachmentExtractor {
        let base = Url::parse("https://tender.example.org").expect("base url");
        AttachmentExtractor::new(base, SelectorBook::default())
    }

    #[test]
    fn labeled_anchor_beats_href_candidates() {
        // The first anchor's href would satisfy a CSS candidate, but the
        // label scan runs first and picks the anchor that says Documents.
        let html = r#"<html><body>
          <a href="/generic?kind=attachment">something else</a>
          <a href="/docs/listing?id=9">View Documents</a>
        </body></html>"#;

        let link = extractor().find_document_link(html);
        assert_eq!(
            link.as_deref(),
            Some("https://tender.example.org/docs/listing?id=9")
        );
    }

    #[test]
    fn href_candidates_cover_unlabeled_pages() {
        let html = r#"<html><body>
          <a href="/files/attachment_list?id=9">open</a>
        </body></html>"#;

        let link = extractor().find_document_link(html);
        assert_eq!(
            link.as_deref(),
            Some("https://tender.example.org/files/attachment_list?id=9")
        );
    }

    #[test]
    fn absolute_hrefs_pass_through_unchanged() {
        let html = r#"<a href="https://cdn.example.org/d.pdf">Download notice</a>"#;
        let link = extractor().find_document_link(html);
        assert_eq!(link.as_deref(), Some("https://cdn.example.org/d.pdf"));
    }

    #[test]
    fn page_without_document_links_yields_nothing() {
        let html = r#"<a href="/home">Back to search</a>"#;
        assert_eq!(extractor().find_document_link(html), None);
    }

    #[test]
    fn listing_harvest_names_types_and_absolutizes() {
        let html = r#"<html><body><table><tr><td>
          <a href="/download?id=1">Tender Notice</a>
          <a href="/files/boq.pdf">  </a>
          <a href="https://cdn.example.org/download/spec.docx?v=2">Spec document</a>
          <a href="/unrelated/link">Other</a>
        </td></tr></table></body></html>"#;

        let attachments = extractor().parse_listing(html);
        assert_eq!(attachments.len(), 3);

        assert_eq!(attachments[0].name, "Tender Notice");
        assert_eq!(attachments[0].url, "https://tender.example.org/download?id=1");
        assert_eq!(attachments[0].file_type, "unknown");

        assert_eq!(attachments[1].name, "Document_2");
        assert_eq!(attachments[1].url, "https://tender.example.org/files/boq.pdf");
        assert_eq!(attachments[1].file_type, "pdf");

        assert_eq!(attachments[2].name, "Spec document");
        assert_eq!(attachments[2].file_type, "docx");
    }

    #[test]
    fn malformed_anchor_selector_harvests_nothing() {
        let mut selectors = SelectorBook::default();
        selectors.attachment_anchors = ":::bad".to_string();
        let base = Url::parse("https://tender.example.org").expect("base url");
        let extractor = AttachmentExtractor::new(base, selectors);

        assert!(extractor.parse_listing(r#"<a href="/download?id=1">x</a>"#).is_empty());
    }
}
