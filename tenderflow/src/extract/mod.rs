//! HTML extraction.
//!
//! Every extractor here works on fetched page text, never on a live
//! browser handle. Pages are parsed once per concern and each sub-extraction
//! is independent: a field that cannot be found becomes `None` rather than
//! failing the record.
//!
//! Selector literals baked into the crate compile through
//! [`literal_selector`]; selectors sourced from configuration are parsed at
//! the use site and skipped with a log line when malformed.

mod attachments;
mod classify;
mod detail;
mod listing;
mod rules;
mod stages;

pub use attachments::AttachmentExtractor;
pub use classify::{ClassifierPolicy, StatusGroup, TypeGroup};
pub use detail::DetailExtractor;
pub use listing::{extract_listing, ListingRow};
pub use rules::{
    apply_rules, parse_tables, CellKind, CellStrategy, DetailField, GridCell, LabelRule,
    TableGrid, LABEL_RULES,
};
pub use stages::extract_stages;

use scraper::{ElementRef, Html, Selector};

/// Text shorter than this is ignored when probing for prose blocks.
const PROSE_MIN_CHARS: usize = 20;

/// Compiles a selector literal.
///
/// Only for selectors written in this crate; configured selectors go
/// through fallible parsing at the call site.
#[allow(clippy::expect_used)]
pub(crate) fn literal_selector(css: &str) -> Selector {
    Selector::parse(css).expect("literal selector compiles")
}

/// An element's text with all whitespace runs collapsed to single spaces.
pub(crate) fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rearranges a `dd-mm-yyyy` date into `yyyy-mm-dd`.
///
/// The parts are moved, not validated; an implausible day survives the
/// rearrangement unchanged.
pub(crate) fn rearrange_dmy(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '-');
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next()?;
    Some(format!("{year}-{month}-{day}"))
}

/// Probes candidate selectors in order. The first selector that matches an
/// element settles the probe: its text is returned, or nothing when the
/// element is blank. Unparseable selectors are skipped.
pub(crate) fn probe_first_text(doc: &Html, candidates: &[String]) -> Option<String> {
    for css in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let text = collapsed_text(element);
            return (!text.is_empty()).then_some(text);
        }
    }
    None
}

/// Probes candidate selectors for a block of prose. Unlike
/// [`probe_first_text`], a candidate whose first match is too short does
/// not settle the probe; later candidates still get a chance.
pub(crate) fn probe_long_text(
    doc: &Html,
    candidates: &[String],
    cap: Option<usize>,
) -> Option<String> {
    for css in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let text = collapsed_text(element);
            if text.chars().count() > PROSE_MIN_CHARS {
                return Some(match cap {
                    Some(limit) => text.chars().take(limit).collect(),
                    None => text,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collapsed_text_flattens_nested_markup() {
        let doc = Html::parse_fragment("<div>  Supply of   <b>pipes</b>\n and fittings </div>");
        let sel = literal_selector("div");
        let div = doc.select(&sel).next().unwrap();
        assert_eq!(collapsed_text(div), "Supply of pipes and fittings");
    }

    #[test]
    fn dmy_rearrangement_moves_parts_verbatim() {
        assert_eq!(rearrange_dmy("15-02-2026").as_deref(), Some("2026-02-15"));
        assert_eq!(rearrange_dmy("99-99-2026").as_deref(), Some("2026-99-99"));
        assert_eq!(rearrange_dmy("2026"), None);
    }

    #[test]
    fn first_existing_element_settles_the_probe() {
        let doc = Html::parse_document("<html><body><h1></h1><h2>Real title</h2></body></html>");
        let candidates = vec!["h1".to_string(), "h2".to_string()];
        // h1 exists but is blank, so the probe ends without a value.
        assert_eq!(probe_first_text(&doc, &candidates), None);

        let candidates = vec!["h3".to_string(), "h2".to_string()];
        assert_eq!(
            probe_first_text(&doc, &candidates).as_deref(),
            Some("Real title")
        );
    }

    #[test]
    fn short_prose_falls_through_to_later_candidates() {
        let doc = Html::parse_document(
            "<html><body><div class=\"a\">short</div>\
             <div class=\"b\">a block of text that is comfortably long enough</div></body></html>",
        );
        let candidates = vec![".a".to_string(), ".b".to_string()];
        assert_eq!(
            probe_long_text(&doc, &candidates, None).as_deref(),
            Some("a block of text that is comfortably long enough")
        );
    }

    #[test]
    fn prose_cap_truncates_by_characters() {
        let doc = Html::parse_document(
            "<html><body><p>abcdefghijklmnopqrstuvwxyz and then some</p></body></html>",
        );
        let candidates = vec!["p".to_string()];
        let text = probe_long_text(&doc, &candidates, Some(26)).unwrap();
        assert_eq!(text, "abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn malformed_candidate_selectors_are_skipped() {
        let doc = Html::parse_document("<html><body><h2>Found anyway</h2></body></html>");
        let candidates = vec![":::nonsense".to_string(), "h2".to_string()];
        assert_eq!(
            probe_first_text(&doc, &candidates).as_deref(),
            Some("Found anyway")
        );
    }
}
