//! Turning an arbitrary result record into an (id, name) pair.
//!
//! Pure and deterministic: the same record shape always yields the same
//! fields. Fallbacks walk keys in the order the service sent them.

use serde_json::Value;

use crate::model::types::{RawRecord, SelectionRecord};

/// Id fields, most preferred first. Numbers are accepted here.
pub const ID_FIELDS: &[&str] = &["id", "key", "recordid"];

/// Display-name fields, most preferred first.
pub const NAME_FIELDS: &[&str] = &["name", "fullname", "displayname", "title", "subject", "label"];

/// Map a record to a selection, or `None` when it has no usable id.
///
/// Id: the first of [`ID_FIELDS`] holding a string or number, then the first
/// string field whose name ends in `id`, then the first string field.
/// Name: the first of [`NAME_FIELDS`] holding a string, then the first string
/// field other than the one used for the id, then the id itself.
pub fn record_to_selection(fields: &RawRecord) -> Option<SelectionRecord> {
    let (id_field, id) = ID_FIELDS
        .iter()
        .find_map(|&key| fields.get(key).and_then(scalar_text).map(|v| (key, v)))
        .or_else(|| {
            string_fields(fields)
                .find(|(key, _)| key.to_ascii_lowercase().ends_with("id"))
                .map(|(key, v)| (key, v.to_string()))
        })
        .or_else(|| string_fields(fields).next().map(|(key, v)| (key, v.to_string())))?;

    let name = NAME_FIELDS
        .iter()
        .find_map(|&key| fields.get(key).and_then(non_empty_str))
        .or_else(|| {
            string_fields(fields)
                .find(|(key, _)| *key != id_field)
                .map(|(_, v)| v)
        })
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    Some(SelectionRecord::new(id, name))
}

fn string_fields(fields: &RawRecord) -> impl Iterator<Item = (&str, &str)> {
    fields
        .iter()
        .filter_map(|(key, value)| non_empty_str(value).map(|v| (key.as_str(), v)))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => non_empty_str(other).map(str::to_string),
    }
}
