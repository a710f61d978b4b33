//! Ordered label rules evaluated over pre-parsed table grids.
//!
//! Detail pages carry most of their data in unlabeled tables. Instead of
//! branching per field, extraction walks a single rule table top-down: each
//! rule names the label variants that identify a field and the order of
//! cell strategies used to read the value next to a matched label.

use scraper::{ElementRef, Html};
use std::collections::HashMap;

/// Logical fields the label rules can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailField {
    /// Inviting organization.
    Organization,
    /// Work or supply location.
    Location,
    /// Issuing department.
    Department,
    /// Tender category.
    Category,
    /// Publication date.
    PublishDate,
    /// Submission deadline.
    ClosingDate,
    /// Estimated contract value.
    EstimatedValue,
    /// Tender document fee.
    TenderFee,
    /// Earnest money deposit.
    Emd,
    /// Officer or authority inviting the tender.
    InvitingAuthority,
}

/// How the value cell is located relative to a matched label cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStrategy {
    /// The cell immediately after the label in the same row.
    RowSibling,
    /// The first data cell after a header-tagged label in the same row.
    HeaderSibling,
    /// The nearest non-blank cell after the label, scanning across rows.
    FollowingSibling,
}

/// One rule: the label variants naming a field and the strategy order.
#[derive(Debug, Clone, Copy)]
pub struct LabelRule {
    /// The field this rule populates.
    pub field: DetailField,
    /// Label variants matched loosely against cell text.
    pub labels: &'static [&'static str],
    /// Cell strategies, earlier ones take precedence.
    pub strategies: &'static [CellStrategy],
}

const DEFAULT_STRATEGIES: &[CellStrategy] = &[
    CellStrategy::RowSibling,
    CellStrategy::HeaderSibling,
    CellStrategy::FollowingSibling,
];

/// The rule table, evaluated top-down.
///
/// Amount labels are deliberately loose: the bare "amount" variant matches
/// any cell that mentions an amount, and the two-way substring match also
/// accepts cells shorter than the label.
pub const LABEL_RULES: &[LabelRule] = &[
    LabelRule {
        field: DetailField::Organization,
        labels: &["organization", "organisation"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::Location,
        labels: &["location"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::Department,
        labels: &["department"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::Category,
        labels: &["category"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::PublishDate,
        labels: &["publish", "posted", "released"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::ClosingDate,
        labels: &["closing", "deadline", "last date", "submission"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::EstimatedValue,
        labels: &[
            "estimated contract value",
            "estimated value",
            "contract value",
            "amount",
        ],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::TenderFee,
        labels: &["tender fee", "document fee"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::Emd,
        labels: &["emd", "earnest money"],
        strategies: DEFAULT_STRATEGIES,
    },
    LabelRule {
        field: DetailField::InvitingAuthority,
        labels: &["inviting authority", "inviting officer", "authority"],
        strategies: DEFAULT_STRATEGIES,
    },
];

/// Whether a grid cell came from a header or data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// A `th` cell.
    Header,
    /// A `td` cell.
    Data,
}

/// One table cell with whitespace-collapsed text.
#[derive(Debug, Clone)]
pub struct GridCell {
    /// Header or data.
    pub kind: CellKind,
    /// Collapsed cell text.
    pub text: String,
}

/// A table flattened to rows of text cells.
#[derive(Debug, Clone, Default)]
pub struct TableGrid {
    /// Rows in document order.
    pub rows: Vec<Vec<GridCell>>,
}

impl TableGrid {
    pub(crate) fn from_element(table: ElementRef<'_>) -> Self {
        let row_sel = super::literal_selector("tr");
        let cell_sel = super::literal_selector("th, td");
        let mut rows = Vec::new();
        for tr in table.select(&row_sel) {
            let cells: Vec<GridCell> = tr
                .select(&cell_sel)
                .map(|cell| GridCell {
                    kind: if cell.value().name() == "th" {
                        CellKind::Header
                    } else {
                        CellKind::Data
                    },
                    text: super::collapsed_text(cell),
                })
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
        Self { rows }
    }
}

/// Parses every table in the document into a grid, in document order.
#[must_use]
pub fn parse_tables(doc: &Html) -> Vec<TableGrid> {
    let table_sel = super::literal_selector("table");
    doc.select(&table_sel).map(TableGrid::from_element).collect()
}

/// Values that count as "no value" when reading a cell.
pub(crate) fn is_blank_marker(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("n a")
}

fn normalize_label(text: &str) -> String {
    let collapsed = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed.trim_end_matches(':').trim().to_string()
}

/// Case-insensitive substring match in either direction.
fn loose_match(cell: &str, label: &str) -> bool {
    let cell = normalize_label(cell);
    if cell.is_empty() {
        return false;
    }
    let label = normalize_label(label);
    cell.contains(&label) || label.contains(&cell)
}

/// Evaluates the rule table over pre-parsed grids.
///
/// Per rule, strategies are tried in order across every grid; the first
/// value that is not a blank marker wins. Fields with no hit are absent
/// from the result.
#[must_use]
pub fn apply_rules(grids: &[TableGrid], rules: &[LabelRule]) -> HashMap<DetailField, String> {
    let mut values = HashMap::new();
    for rule in rules {
        if let Some(value) = evaluate_rule(grids, rule) {
            values.insert(rule.field, value);
        }
    }
    values
}

fn evaluate_rule(grids: &[TableGrid], rule: &LabelRule) -> Option<String> {
    for strategy in rule.strategies {
        for grid in grids {
            if let Some(value) = scan_grid(grid, rule.labels, *strategy) {
                return Some(value);
            }
        }
    }
    None
}

fn scan_grid(grid: &TableGrid, labels: &[&str], strategy: CellStrategy) -> Option<String> {
    for (row_idx, row) in grid.rows.iter().enumerate() {
        for (cell_idx, cell) in row.iter().enumerate() {
            if !labels.iter().any(|label| loose_match(&cell.text, label)) {
                continue;
            }
            let value = match strategy {
                CellStrategy::RowSibling => row.get(cell_idx + 1).map(|c| c.text.clone()),
                CellStrategy::HeaderSibling => {
                    if cell.kind == CellKind::Header {
                        row.iter()
                            .skip(cell_idx + 1)
                            .find(|c| c.kind == CellKind::Data)
                            .map(|c| c.text.clone())
                    } else {
                        None
                    }
                }
                CellStrategy::FollowingSibling => following_cell(grid, row_idx, cell_idx),
            };
            if let Some(value) = value {
                if !is_blank_marker(&value) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn following_cell(grid: &TableGrid, row_idx: usize, cell_idx: usize) -> Option<String> {
    for cell in grid.rows[row_idx].iter().skip(cell_idx + 1) {
        if !is_blank_marker(&cell.text) {
            return Some(cell.text.clone());
        }
    }
    for row in grid.rows.iter().skip(row_idx + 1) {
        for cell in row {
            if !is_blank_marker(&cell.text) {
                return Some(cell.text.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grids_of(html: &str) -> Vec<TableGrid> {
        parse_tables(&Html::parse_document(html))
    }

    #[test]
    fn row_sibling_wins_over_later_strategies() {
        let grids = grids_of(
            "<table><tr><td>Organization Name :</td><td>Water Board</td></tr>\
             <tr><td>Else</td><td>Noise</td></tr></table>",
        );
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(values[&DetailField::Organization], "Water Board");
    }

    #[test]
    fn blank_markers_are_skipped() {
        let grids = grids_of(
            "<table>\
             <tr><td>Location</td><td>N/A</td></tr>\
             <tr><td>Location of work</td><td>Zone 4, Rajkot</td></tr>\
             </table>",
        );
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(values[&DetailField::Location], "Zone 4, Rajkot");
    }

    #[test]
    fn header_sibling_reads_past_blank_header_cells() {
        // The immediate row sibling is a blank th, so the header strategy
        // has to find the first data cell instead.
        let grids = grids_of(
            "<table><tr><th>Department</th><th></th><td>Roads &amp; Buildings</td></tr></table>",
        );
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(values[&DetailField::Department], "Roads & Buildings");
    }

    #[test]
    fn loose_match_works_in_both_directions() {
        // Cell shorter than the label variant still matches.
        let grids = grids_of("<table><tr><td>EMD</td><td>25,000</td></tr></table>");
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(values[&DetailField::Emd], "25,000");

        // Cell longer than the label variant matches too.
        let grids =
            grids_of("<table><tr><td>EMD Amount Payable</td><td>1,000</td></tr></table>");
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(values[&DetailField::Emd], "1,000");
    }

    #[test]
    fn following_sibling_is_the_last_resort() {
        // Label sits alone in its row; the value is in the next row.
        let grids = grids_of(
            "<table>\
             <tr><td>Inviting Authority</td></tr>\
             <tr><td>Executive Engineer, Division 2</td></tr>\
             </table>",
        );
        let values = apply_rules(&grids, LABEL_RULES);
        assert_eq!(
            values[&DetailField::InvitingAuthority],
            "Executive Engineer, Division 2"
        );
    }

    #[test]
    fn unmatched_fields_are_absent() {
        let grids = grids_of("<table><tr><td>Unrelated</td><td>Row</td></tr></table>");
        let values = apply_rules(&grids, LABEL_RULES);
        assert!(values.is_empty());
    }

    #[test]
    fn blank_marker_catches_all_variants() {
        assert!(is_blank_marker(""));
        assert!(is_blank_marker("  "));
        assert!(is_blank_marker("N/A"));
        assert!(is_blank_marker("n a"));
        assert!(!is_blank_marker("0"));
    }
}
