//! Events the control processes, in arrival order, on its single task.

use crate::model::types::{RawRecord, RequestToken};
use crate::search::orchestrator::TransportError;

/// Keys the control reacts to. Character input arrives as whole-text updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
}

/// Something the user or the host did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    SetText(String),
    Focus,
    Blur,
    Key(Key),
    PointerDownOutside,
    SelectRow(usize),
    Clear,
    HostValueChanged(String),
    HostTemplateChanged(String),
    Teardown,
}

/// Everything that can reach the control's event queue.
#[derive(Debug)]
pub enum ControlEvent {
    User(UserEvent),
    DebounceElapsed {
        seq: u64,
        text: String,
    },
    BlurGraceElapsed {
        seq: u64,
    },
    SearchResolved {
        token: RequestToken,
        outcome: Result<Vec<RawRecord>, TransportError>,
    },
}
