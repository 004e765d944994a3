//! Normalized value types for the lookup control.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A record as returned by the record search service: an arbitrary mapping of
/// field names to JSON values.
pub type RawRecord = Map<String, Value>;

/// The committed (id, name) pair. Replaced wholesale, never edited in place.
///
/// The serialized form is the canonical external value handed to the host:
/// a JSON object with exactly the two string fields `id` and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionRecord {
    id: String,
    name: String,
}

/// Why a serialized selection could not be read back.
#[derive(Debug, thiserror::Error)]
pub enum SelectionParseError {
    #[error("serialized selection is empty")]
    Empty,

    #[error("malformed selection: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SelectionRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strict parse of the canonical serialized form.
    pub fn from_serialized(raw: &str) -> Result<Self, SelectionParseError> {
        if raw.trim().is_empty() {
            return Err(SelectionParseError::Empty);
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Lenient parse used at the host boundary: anything malformed is simply
    /// "no selection".
    pub fn parse(raw: &str) -> Option<Self> {
        match Self::from_serialized(raw) {
            Ok(record) => Some(record),
            Err(SelectionParseError::Empty) => None,
            Err(err) => {
                tracing::debug!(error = %err, "selection_parse_ignored");
                None
            }
        }
    }

    /// Canonical serialized form.
    pub fn to_serialized(&self) -> String {
        // Two plain string fields always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Monotonically increasing sequence number identifying one search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the search side of the control currently is.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Debouncing,
    InFlight(RequestToken),
    Displaying(Vec<RawRecord>),
    Failed,
}

impl SearchState {
    pub fn label(&self) -> &'static str {
        match self {
            SearchState::Idle => "idle",
            SearchState::Debouncing => "debouncing",
            SearchState::InFlight(_) => "in_flight",
            SearchState::Displaying(_) => "displaying",
            SearchState::Failed => "failed",
        }
    }

    /// The dropdown is open only while results are being displayed.
    pub fn is_open(&self) -> bool {
        matches!(self, SearchState::Displaying(_))
    }
}

/// Derived view of the selection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPhase {
    /// No text and no selection.
    Empty,
    /// Free text without a committed selection.
    Editing,
    /// Free text with results open for picking.
    Selecting,
    /// A committed selection whose name is the displayed text.
    Selected,
}

/// Top-level state owned exclusively by one control instance.
///
/// Mutated only through the transitions in [`crate::selection`] and the
/// control's search handling.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlState {
    pub(crate) raw_text: String,
    pub(crate) selection: Option<SelectionRecord>,
    pub(crate) search: SearchState,
}

impl ControlState {
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn selection(&self) -> Option<&SelectionRecord> {
        self.selection.as_ref()
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }
}
