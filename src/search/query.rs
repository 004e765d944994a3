//! Query building: substitutes the user's search text into the host's
//! templated query.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Placeholder replaced by the escaped search text.
pub const SEARCH_PLACEHOLDER: &str = "{searchText}";

static ROOT_ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<entity\s[^>]*?\bname\s*=\s*(?:'([^']*)'|"([^"]*)")"#)
        .expect("root entity regex")
});

/// Host-owned query template. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryTemplate(String);

/// A concrete query ready for the record search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltQuery {
    /// Root entity the query targets; empty when the template names none.
    pub entity_name: String,
    /// Template with every placeholder substituted.
    pub text: String,
}

impl QueryTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty template disables searching altogether.
    pub fn is_disabled(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Substitute `search_text` into every placeholder. Returns `None` when
    /// searching is disabled.
    pub fn build(&self, search_text: &str) -> Option<BuiltQuery> {
        if self.is_disabled() {
            return None;
        }
        let escaped = escape_search_text(search_text);
        Some(BuiltQuery {
            entity_name: root_entity_name(&self.0),
            text: self.0.replace(SEARCH_PLACEHOLDER, &escaped),
        })
    }
}

impl From<&str> for QueryTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueryTemplate {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Escape text for embedding inside an XML attribute value.
pub fn escape_search_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape_search_text`].
pub fn unescape_search_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Name attribute of the first `<entity>` element, or empty when the template
/// has none.
pub fn root_entity_name(template: &str) -> String {
    ROOT_ENTITY_RE
        .captures(template)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
