//! Selection state machine.
//!
//! `ControlState` moves through `Empty → Editing → Selecting → Selected →
//! Editing → …`. Every transition here is synchronous and reports whether the
//! host must be told the output changed. The search side (timers, requests)
//! is coordinated by the control; these transitions only touch the state.

pub mod extract;

pub use extract::record_to_selection;

use crate::model::types::{ControlState, SearchState, SelectionPhase, SelectionRecord};

/// Whether a transition changed the host-visible output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Notify {
    Host,
    Silent,
}

impl ControlState {
    /// Build initial state from the host's persisted value. Unparsable input
    /// starts with no selection.
    pub fn initialize(serialized: &str) -> Self {
        let mut state = Self::default();
        state.apply_external(serialized);
        state
    }

    pub fn phase(&self) -> SelectionPhase {
        if self.selection.is_some() {
            SelectionPhase::Selected
        } else if self.search.is_open() {
            SelectionPhase::Selecting
        } else if self.raw_text.is_empty() {
            SelectionPhase::Empty
        } else {
            SelectionPhase::Editing
        }
    }

    /// Serialized selection, or empty when nothing is selected.
    pub fn output(&self) -> String {
        self.selection
            .as_ref()
            .map(SelectionRecord::to_serialized)
            .unwrap_or_default()
    }

    /// A keystroke. Diverging from the selected name drops the selection
    /// before anything else happens for this keystroke.
    pub(crate) fn apply_text(&mut self, text: &str) -> Notify {
        let invalidated = self
            .selection
            .as_ref()
            .is_some_and(|selected| selected.name() != text);
        if invalidated {
            self.selection = None;
        }
        self.raw_text = text.to_string();
        if invalidated {
            Notify::Host
        } else {
            Notify::Silent
        }
    }

    /// Replace any selection wholesale and show its name.
    pub(crate) fn apply_commit(&mut self, record: SelectionRecord) -> Notify {
        self.raw_text = record.name().to_string();
        self.selection = Some(record);
        self.search = SearchState::Idle;
        Notify::Host
    }

    pub(crate) fn apply_clear(&mut self) -> Notify {
        self.selection = None;
        self.raw_text.clear();
        self.search = SearchState::Idle;
        Notify::Host
    }

    /// Host pushed a new canonical value. The displayed text always follows.
    pub(crate) fn apply_external(&mut self, serialized: &str) {
        self.selection = SelectionRecord::parse(serialized);
        self.raw_text = self
            .selection
            .as_ref()
            .map(|record| record.name().to_string())
            .unwrap_or_default();
    }

    pub(crate) fn close_results(&mut self) {
        self.search = SearchState::Idle;
    }
}
