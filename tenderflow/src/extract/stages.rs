//! Stage, form, and required-document extraction.
//!
//! Detail pages have no foreign keys between a stage and its forms or
//! document tables; the only association is a heading printed above each
//! table. The document is therefore parsed once into a list of
//! heading-annotated grids, and stages are joined to their sections by two
//! keys: the section marker in the heading and the stage's own name.

use crate::extract::rules::{is_blank_marker, CellKind, GridCell, TableGrid};
use crate::models::{RequiredDocument, StageForm, TenderStage};
use scraper::Html;
use tracing::debug;

/// Marker phrases identifying the stage summary table's header row.
const STAGE_NAME_MARKER: &str = "stage name";
const EVALUATION_DATE_MARKER: &str = "evaluation date";

/// Section markers looked up in the heading above a joined table.
const FORMS_MARKER: &str = "forms";
const DOCUMENTS_MARKER: &str = "documents";

/// A table grid annotated with the nearest preceding heading.
#[derive(Debug)]
struct HeadedTable {
    heading: Option<String>,
    grid: TableGrid,
}

/// Extracts evaluation stages with their joined forms and documents.
///
/// Returns an empty list when the page has no stage summary table.
#[must_use]
pub fn extract_stages(doc: &Html) -> Vec<TenderStage> {
    let tables = headed_tables(doc);

    let Some(summary_idx) = tables
        .iter()
        .position(|table| is_stage_summary(&table.grid))
    else {
        return Vec::new();
    };

    let mut stages = parse_summary_rows(&tables[summary_idx].grid);
    debug!(stages = stages.len(), "parsed stage summary table");

    for stage in &mut stages {
        let stage_name = stage.name.to_lowercase();
        for (idx, table) in tables.iter().enumerate() {
            if idx == summary_idx {
                continue;
            }
            let Some(heading) = &table.heading else {
                continue;
            };
            let heading = heading.to_lowercase();
            if !heading.contains(&stage_name) {
                continue;
            }
            if heading.contains(FORMS_MARKER) && stage.forms.is_empty() {
                stage.forms = parse_forms(&table.grid);
            }
            if heading.contains(DOCUMENTS_MARKER) && stage.required_documents.is_empty() {
                stage.required_documents = parse_documents(&table.grid);
            }
        }
    }
    stages
}

/// Walks headings and tables in document order, annotating each table with
/// the text of the nearest heading above it.
fn headed_tables(doc: &Html) -> Vec<HeadedTable> {
    let walker = super::literal_selector("h1, h2, h3, h4, h5, h6, table");
    let mut tables = Vec::new();
    let mut last_heading: Option<String> = None;

    for element in doc.select(&walker) {
        if element.value().name() == "table" {
            tables.push(HeadedTable {
                heading: last_heading.clone(),
                grid: TableGrid::from_element(element),
            });
        } else {
            let text = super::collapsed_text(element);
            if !text.is_empty() {
                last_heading = Some(text);
            }
        }
    }
    tables
}

fn is_stage_summary(grid: &TableGrid) -> bool {
    let Some(header) = grid.rows.first() else {
        return false;
    };
    let text = row_text(header);
    text.contains(STAGE_NAME_MARKER) && text.contains(EVALUATION_DATE_MARKER)
}

fn parse_summary_rows(grid: &TableGrid) -> Vec<TenderStage> {
    let mut stages = Vec::new();
    for row in grid.rows.iter().skip(1) {
        let Some(name) = cell_value(row, 0) else {
            continue;
        };
        let mut stage = TenderStage::new(name);
        stage.evaluation_date = cell_value(row, 1);
        stage.minimum_forms = cell_value(row, 2);
        stages.push(stage);
    }
    stages
}

fn parse_forms(grid: &TableGrid) -> Vec<StageForm> {
    let mut forms = Vec::new();
    for row in grid.rows.iter() {
        if is_header_row(row) || row_text(row).contains("form name") {
            continue;
        }
        let Some(name) = cell_value(row, 1) else {
            continue;
        };
        forms.push(StageForm {
            form_id: cell_value(row, 0),
            name,
            mode: cell_value(row, 2),
            submission_type: cell_value(row, 3),
            mandatory: row.get(4).is_some_and(|cell| parse_mandatory(&cell.text)),
        });
    }
    forms
}

fn parse_documents(grid: &TableGrid) -> Vec<RequiredDocument> {
    let mut documents = Vec::new();
    for row in grid.rows.iter() {
        if is_header_row(row) || row_text(row).contains("document name") {
            continue;
        }
        let first = cell_value(row, 0);
        let sequence = first.as_deref().and_then(|text| text.parse::<u32>().ok());

        let (name, mandatory_idx) = if sequence.is_some() {
            (cell_value(row, 1), 2)
        } else {
            (first, 1)
        };
        let Some(name) = name else {
            continue;
        };
        documents.push(RequiredDocument {
            sequence,
            name,
            mandatory: row
                .get(mandatory_idx)
                .is_some_and(|cell| parse_mandatory(&cell.text)),
        });
    }
    documents
}

fn is_header_row(row: &[GridCell]) -> bool {
    !row.is_empty() && row.iter().all(|cell| cell.kind == CellKind::Header)
}

fn row_text(row: &[GridCell]) -> String {
    row.iter()
        .map(|cell| cell.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_value(row: &[GridCell], idx: usize) -> Option<String> {
    row.get(idx)
        .map(|cell| cell.text.clone())
        .filter(|text| !is_blank_marker(text))
}

fn parse_mandatory(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "mandatory"
    )
}
