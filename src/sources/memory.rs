//! In-memory record source.
//!
//! Serves records from a JSON document keyed by entity name:
//!
//! ```json
//! { "contact": [ { "contactid": "1", "fullname": "Jo March" } ] }
//! ```
//!
//! The built query is evaluated loosely: every `<condition>` with a `like`
//! operator must match its attribute (case-insensitive, `%` wildcards at
//! either end); `eq` conditions compare case-insensitively. Records are
//! returned in document order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::model::types::RawRecord;
use crate::search::orchestrator::{RecordSearch, TransportError};
use crate::search::query::{BuiltQuery, unescape_search_text};

static CONDITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<condition\b([^>]*?)/?>").expect("condition regex"));
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")"#).expect("attribute regex")
});

/// One filter pulled out of a built query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

impl Condition {
    fn matches(&self, record: &RawRecord) -> bool {
        let Some(field) = record.get(&self.attribute) else {
            return false;
        };
        let haystack = match field {
            Value::String(s) => s.to_lowercase(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return false,
        };
        let needle = self.value.to_lowercase();
        match self.operator.to_ascii_lowercase().as_str() {
            "like" => like_matches(&haystack, &needle),
            "eq" => haystack == needle,
            "ne" | "neq" => haystack != needle,
            // Unknown operators do not filter.
            _ => true,
        }
    }
}

fn like_matches(haystack: &str, pattern: &str) -> bool {
    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > 1 && pattern.ends_with('%');
    let core = pattern.trim_matches('%');
    match (leading, trailing) {
        (true, true) => haystack.contains(core),
        (true, false) => haystack.ends_with(core),
        (false, true) => haystack.starts_with(core),
        (false, false) => haystack == core,
    }
}

/// Extract the `<condition>` filters from a query.
pub fn parse_conditions(query: &str) -> Vec<Condition> {
    CONDITION_RE
        .captures_iter(query)
        .filter_map(|caps| {
            let attrs: HashMap<String, String> = ATTRIBUTE_RE
                .captures_iter(caps.get(1)?.as_str())
                .filter_map(|a| {
                    let key = a.get(1)?.as_str().to_ascii_lowercase();
                    let value = a.get(2).or_else(|| a.get(3))?.as_str();
                    Some((key, unescape_search_text(value)))
                })
                .collect();
            Some(Condition {
                attribute: attrs.get("attribute")?.clone(),
                operator: attrs.get("operator").cloned().unwrap_or_else(|| "eq".into()),
                value: attrs.get("value").cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// A [`RecordSearch`] over records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: HashMap<String, Vec<RawRecord>>,
    latency: Duration,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<BuiltQuery>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{ entity: [records...] }` document.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text).context("parsing records document")?;
        let Value::Object(entities) = doc else {
            bail!("records document must be an object keyed by entity name");
        };
        let mut source = Self::new();
        for (entity, records) in entities {
            let Value::Array(items) = records else {
                bail!("records for entity `{entity}` must be an array");
            };
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => bail!("record in `{entity}` is not an object: {other}"),
                })
                .collect::<Result<Vec<_>>>()?;
            source.entities.insert(entity, records);
        }
        Ok(source)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading records from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading {}", path.display()))
    }

    pub fn with_entity(mut self, entity: impl Into<String>, records: Vec<RawRecord>) -> Self {
        self.entities.insert(entity.into(), records);
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every request with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Queries received so far, oldest first.
    pub fn calls(&self) -> Vec<BuiltQuery> {
        self.calls.lock().clone()
    }

    /// Records of the query's entity that satisfy all its conditions.
    pub fn matching(&self, query: &BuiltQuery) -> Vec<RawRecord> {
        let Some(records) = self.entities.get(&query.entity_name) else {
            return Vec::new();
        };
        let conditions = parse_conditions(&query.text);
        records
            .iter()
            .filter(|record| conditions.iter().all(|c| c.matches(record)))
            .cloned()
            .collect()
    }
}

impl RecordSearch for MemorySource {
    async fn search_records(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, TransportError> {
        self.calls.lock().push(query.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(message) = &self.failure {
            return Err(TransportError::new(message.clone()));
        }
        Ok(self.matching(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::QueryTemplate;

    const DOC: &str = r#"{
        "contact": [
            { "contactid": "1", "fullname": "Jo March", "city": "Concord" },
            { "contactid": "2", "fullname": "Amy March", "city": "Concord" },
            { "contactid": "3", "fullname": "Laurie", "city": "Boston" }
        ],
        "account": [ { "accountid": "a", "name": "Acme" } ]
    }"#;

    fn query(template: &str, text: &str) -> BuiltQuery {
        QueryTemplate::new(template).build(text).unwrap()
    }

    #[test]
    fn like_condition_filters_case_insensitively() {
        let source = MemorySource::from_json(DOC).unwrap();
        let q = query(
            "<entity name='contact'><filter><condition attribute='fullname' operator='like' value='%{searchText}%'/></filter></entity>",
            "march",
        );
        let matched = source.matching(&q);
        let names: Vec<&str> = matched
            .iter()
            .filter_map(|r| r.get("fullname").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["Jo March", "Amy March"]);
    }

    #[test]
    fn all_conditions_must_match() {
        let source = MemorySource::from_json(DOC).unwrap();
        let q = query(
            r#"<entity name="contact"><filter><condition attribute="fullname" operator="like" value="{searchText}%"/><condition attribute="city" operator="eq" value="concord"/></filter></entity>"#,
            "Amy",
        );
        assert_eq!(source.matching(&q).len(), 1);
    }

    #[test]
    fn unknown_entity_or_missing_name_returns_nothing() {
        let source = MemorySource::from_json(DOC).unwrap();
        assert!(source.matching(&query("{searchText}", "Jo")).is_empty());
        assert!(
            source
                .matching(&query("<entity name='lead'></entity>", "Jo"))
                .is_empty()
        );
    }

    #[test]
    fn escaped_values_are_compared_unescaped() {
        let conditions = parse_conditions(
            &query("<condition attribute='name' operator='like' value='%{searchText}%'/>", "O'Neil & Co").text,
        );
        assert_eq!(
            conditions,
            vec![Condition {
                attribute: "name".into(),
                operator: "like".into(),
                value: "%O'Neil & Co%".into(),
            }]
        );
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(MemorySource::from_json("[]").is_err());
        assert!(MemorySource::from_json(r#"{"contact": {}}"#).is_err());
        assert!(MemorySource::from_json(r#"{"contact": [1]}"#).is_err());
    }

    #[tokio::test]
    async fn records_calls_and_fails_on_request() {
        let source = MemorySource::from_json(DOC).unwrap().failing("gateway timeout");
        let q = query("<entity name='account'/>", "Ac");
        let err = source.search_records(&q).await.unwrap_err();
        assert_eq!(err.message(), "gateway timeout");
        assert_eq!(source.calls(), vec![q]);
    }
}
