//! Field storage keys.
//!
//! Values are stored under a key derived from the field's position, not its
//! label, so renaming a label never orphans data. Documents written before
//! positional keys existed used the label; reads fall back to it and writes
//! move the value to the positional key.

use serde_json::Value;

use crate::models::{DocumentData, DocumentTemplate};

/// Stable key for the field at `(section_index, field_index)` of a template.
pub fn compute_field_key(template_id: i64, section_index: usize, field_index: usize) -> String {
    format!("field_{}_{}_{}", template_id, section_index, field_index)
}

/// Borrow the stored value for `key`, falling back to the legacy name key.
pub fn lookup_field_value<'a>(
    data: &'a DocumentData,
    key: &str,
    fallback_name: Option<&str>,
) -> Option<&'a Value> {
    data.get(key)
        .or_else(|| fallback_name.and_then(|name| data.get(name)))
}

/// Stored value for `key` (or the legacy name), or the empty-string sentinel.
pub fn get_field_value(data: &DocumentData, key: &str, fallback_name: Option<&str>) -> Value {
    lookup_field_value(data, key, fallback_name)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

/// Return a copy of `data` with `key` set to `value`.
///
/// A legacy entry under `fallback_name` is dropped from the copy when it
/// differs from `key`. The input map is never modified.
pub fn set_field_value(
    data: &DocumentData,
    key: &str,
    value: Value,
    fallback_name: Option<&str>,
) -> DocumentData {
    let mut next = data.clone();
    if let Some(name) = fallback_name {
        if name != key {
            next.remove(name);
        }
    }
    next.insert(key.to_string(), value);
    next
}

/// Move every legacy name-keyed value of `template` to its positional key.
///
/// Values already under a positional key win over legacy ones. Keys that
/// match no field are kept untouched.
pub fn migrate_document_data(template: &DocumentTemplate, data: &DocumentData) -> DocumentData {
    let mut next = data.clone();
    for (s, f, field) in template.fields() {
        let key = compute_field_key(template.id, s, f);
        if next.contains_key(&key) {
            if field.name != key {
                next.remove(&field.name);
            }
            continue;
        }
        if let Some(value) = data.get(&field.name) {
            next = set_field_value(&next, &key, value.clone(), Some(&field.name));
        }
    }
    next
}
