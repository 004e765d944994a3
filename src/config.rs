//! Timing and sizing knobs for the lookup control.
//!
//! None of these are user-visible state; they are fixed for the lifetime of a
//! control instance. Hosts either take the defaults or read overrides from the
//! environment via [`LookupConfig::from_env`].

use std::time::Duration;

/// Delay between the last keystroke and the search it triggers.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// How long a blur waits before closing results, so a pointer click on a
/// result row lands first.
pub const DEFAULT_BLUR_GRACE_MS: u64 = 200;

/// Minimum trimmed length (in characters) before a search is issued.
pub const DEFAULT_MIN_SEARCH_CHARS: usize = 2;

/// Upper bound on presented result rows.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Configuration for a [`crate::ui::control::LookupControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Debounce delay applied to keystrokes.
    pub debounce: Duration,
    /// Grace delay between losing focus and closing results.
    pub blur_grace: Duration,
    /// Minimum trimmed text length that may reach the record search service.
    pub min_search_chars: usize,
    /// Maximum number of rows the presenter yields.
    pub max_results: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            blur_grace: Duration::from_millis(DEFAULT_BLUR_GRACE_MS),
            min_search_chars: DEFAULT_MIN_SEARCH_CHARS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl LookupConfig {
    /// Load config from environment variables, keeping defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(ms) = env_parse::<u64>("LOOKUP_DEBOUNCE_MS") {
            cfg.debounce = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("LOOKUP_BLUR_GRACE_MS") {
            cfg.blur_grace = Duration::from_millis(ms);
        }

        if let Some(chars) = env_parse::<usize>("LOOKUP_MIN_CHARS")
            && chars > 0
        {
            cfg.min_search_chars = chars;
        }

        if let Some(max) = env_parse::<usize>("LOOKUP_MAX_RESULTS")
            && max > 0
        {
            cfg.max_results = max;
        }

        cfg
    }
}

/// Length gate shared by the debounce and the orchestrator: counts the
/// characters of the trimmed text.
pub fn meets_min_length(text: &str, min_search_chars: usize) -> bool {
    text.trim().chars().count() >= min_search_chars
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    dotenvy::var(key).ok()?.trim().parse().ok()
}
