//! Search side of the lookup control.
//!
//! - **[`query`]**: template substitution and root entity extraction.
//! - **[`debounce`]**: cancellable timers and the keystroke debounce.
//! - **[`orchestrator`]**: request tokens, the record search seam, stale-response filtering.

pub mod debounce;
pub mod orchestrator;
pub mod query;
