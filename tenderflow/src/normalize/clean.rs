//! Field-level cleanup: markup stripping, whitespace collapse, date forms.

use crate::models::TenderRecord;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static MARKUP: LazyLock<Regex> = LazyLock::new(|| compiled(r"<[^>]+>"));
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| compiled(r"[^\w\s.,;:()\-/&]"));
static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    compiled(r"(?i)(?:for\s+more\s+details|please\s+visit|click\s+here|download\s+document).*")
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| compiled(r"^\d{4}-\d{2}-\d{2}$"));
static DMY_DASH: LazyLock<Regex> = LazyLock::new(|| compiled(r"^(\d{2})-(\d{2})-(\d{4})$"));
static DMY_SLASH: LazyLock<Regex> = LazyLock::new(|| compiled(r"^(\d{2})/(\d{2})/(\d{4})$"));

/// Longest description kept after cleanup, in characters.
const DESCRIPTION_CAP: usize = 5000;

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal pattern compiles")
}

/// Strips markup, collapses whitespace, and drops disallowed punctuation.
///
/// Kept characters are word characters, whitespace, and `.,;:()-/&`.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let text = MARKUP.replace_all(text, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = DISALLOWED.replace_all(&text, "");
    text.trim().to_string()
}

/// Cleans a description and strips trailing boilerplate.
///
/// Once a boilerplate phrase such as "for more details" appears, everything
/// from it to the end of the string is removed. Output longer than the cap
/// is truncated with a trailing ellipsis.
#[must_use]
pub fn clean_description(description: &str) -> String {
    let cleaned = clean_text(description);
    let cleaned = BOILERPLATE.replace_all(&cleaned, "");
    let mut cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() > DESCRIPTION_CAP {
        cleaned = cleaned.chars().take(DESCRIPTION_CAP).collect::<String>() + "...";
    }
    cleaned.trim().to_string()
}

/// Normalizes a date string to `YYYY-MM-DD` where the form is recognized.
///
/// ISO input passes through untouched. `DD-MM-YYYY` and `DD/MM/YYYY` are
/// rearranged without calendar validation, matching how the source site
/// renders dates. Anything else is returned byte-identical with a warning
/// so downstream consumers can still see the raw value.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if ISO_DATE.is_match(raw) {
        return raw.to_string();
    }
    if let Some(caps) = DMY_DASH.captures(raw).or_else(|| DMY_SLASH.captures(raw)) {
        return format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]);
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(raw, "%d-%m-%Y") {
        return parsed.format("%Y-%m-%d").to_string();
    }
    warn!(date = raw, "could not normalize date");
    raw.to_string()
}

/// Cleans the free-text and date fields of one record in place.
pub fn clean_record(record: &mut TenderRecord) {
    record.title = clean_text(&record.title);
    record.organization = clean_text(&record.organization);
    record.description = record.description.take().map(|d| clean_description(&d));
    record.publish_date = record.publish_date.take().map(|d| normalize_date(&d));
    record.closing_date = record.closing_date.take().map(|d| normalize_date(&d));
    record.location = record.location.take().map(|l| clean_text(&l));
}

/// Cleans every record in the batch.
#[must_use]
pub fn clean_batch(mut records: Vec<TenderRecord>) -> Vec<TenderRecord> {
    debug!(count = records.len(), "cleaning tender batch");
    for record in &mut records {
        clean_record(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_text_strips_markup_and_collapses_whitespace() {
        let input = "<p>Road   work\n\tin <b>Zone 4</b></p>";
        assert_eq!(clean_text(input), "Road work in Zone 4");
    }

    #[test]
    fn markup_removal_joins_adjacent_words() {
        assert_eq!(clean_text("<b>Road</b>work"), "Roadwork");
    }

    #[test]
    fn clean_text_keeps_allowed_punctuation_only() {
        let input = "Supply of pipes (DN-300), cost: 1,200/unit & fittings! @site #3";
        assert_eq!(
            clean_text(input),
            "Supply of pipes (DN-300), cost: 1,200/unit & fittings site 3"
        );
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_text("<td>Supply of  (DN-300) pipes!</td>");
        assert_eq!(clean_text(&once), once);

        let once = clean_description("Bridge repair. For more details see notice.");
        assert_eq!(clean_description(&once), once);
    }

    #[test]
    fn description_boilerplate_runs_to_end_of_string() {
        let input = "Construction of bridge. For more details visit the portal. Section 9.";
        assert_eq!(clean_description(input), "Construction of bridge.");
    }

    #[test]
    fn description_is_capped_with_ellipsis() {
        let input = "x".repeat(6000);
        let cleaned = clean_description(&input);
        assert_eq!(cleaned.chars().count(), 5003);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn iso_dates_pass_through() {
        assert_eq!(normalize_date("2026-03-14"), "2026-03-14");
    }

    #[test]
    fn dmy_forms_are_rearranged() {
        assert_eq!(normalize_date("14-03-2026"), "2026-03-14");
        assert_eq!(normalize_date("14/03/2026"), "2026-03-14");
    }

    #[test]
    fn unrecognized_dates_are_returned_unchanged() {
        assert_eq!(normalize_date("March 14, 2026"), "March 14, 2026");
        assert_eq!(normalize_date("n/a"), "n/a");
    }

    #[test]
    fn loose_single_digit_dates_fall_back_to_parsing() {
        assert_eq!(normalize_date("4-3-2026"), "2026-03-04");
    }

    #[test]
    fn clean_record_touches_expected_fields() {
        let mut record = crate::models::TenderRecord::new("42");
        record.title = "<b>Bridge  repair</b>".to_string();
        record.closing_date = Some("01/02/2026".to_string());
        record.location = Some("Ward No. 7 !!".to_string());

        clean_record(&mut record);

        assert_eq!(record.title, "Bridge repair");
        assert_eq!(record.closing_date.as_deref(), Some("2026-02-01"));
        assert_eq!(record.location.as_deref(), Some("Ward No. 7"));
        assert_eq!(record.publish_date, None);
    }
}
