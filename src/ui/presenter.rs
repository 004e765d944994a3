//! Result rows derived from the search state. Holds no state of its own.

use serde::Serialize;

use crate::model::types::{SearchState, SelectionRecord};
use crate::selection::record_to_selection;

/// Label of the placeholder row shown for an empty result set.
pub const NO_RESULTS_LABEL: &str = "No records found";

/// One row of the dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultRow {
    Record { id: String, name: String },
    NoResults { label: String },
}

impl ResultRow {
    pub fn is_selectable(&self) -> bool {
        matches!(self, ResultRow::Record { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            ResultRow::Record { name, .. } => name,
            ResultRow::NoResults { label } => label,
        }
    }

    /// The selection this row commits, if it is selectable.
    pub fn selection(&self) -> Option<SelectionRecord> {
        match self {
            ResultRow::Record { id, name } => Some(SelectionRecord::new(id.clone(), name.clone())),
            ResultRow::NoResults { .. } => None,
        }
    }
}

/// Map the current search state to rows, capped at `limit` records.
///
/// Only `Displaying` produces rows. Records without a usable id are skipped;
/// if none remain a single non-selectable placeholder row is emitted so the
/// dropdown still opens.
pub fn present(search: &SearchState, limit: usize) -> Vec<ResultRow> {
    let SearchState::Displaying(records) = search else {
        return Vec::new();
    };

    let rows: Vec<ResultRow> = records
        .iter()
        .filter_map(record_to_selection)
        .take(limit)
        .map(|record| ResultRow::Record {
            id: record.id().to_string(),
            name: record.name().to_string(),
        })
        .collect();

    if rows.is_empty() {
        vec![ResultRow::NoResults {
            label: NO_RESULTS_LABEL.to_string(),
        }]
    } else {
        rows
    }
}
