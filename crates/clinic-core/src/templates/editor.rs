//! Input control descriptors for template fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{FieldType, TemplateField};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The control an editor should show for a field, with its current value
/// coerced to the field's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum FieldEditor {
    Text { value: String },
    Number { value: Option<f64> },
    Textarea { value: String },
    Date { value: Option<NaiveDate> },
    Select { options: Vec<String>, selected: Option<String> },
    Checkbox { checked: bool },
    /// Field type this core does not know how to edit
    Unsupported { type_name: String },
}

impl FieldEditor {
    /// Value to store back into the document data.
    ///
    /// Unset number, date and select controls store the empty-string sentinel.
    pub fn into_value(self) -> Value {
        match self {
            FieldEditor::Text { value } | FieldEditor::Textarea { value } => Value::String(value),
            FieldEditor::Number { value } => value
                .and_then(number_value)
                .unwrap_or_else(empty),
            FieldEditor::Date { value } => value
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .unwrap_or_else(empty),
            FieldEditor::Select { selected, .. } => selected.map(Value::String).unwrap_or_else(empty),
            FieldEditor::Checkbox { checked } => Value::Bool(checked),
            FieldEditor::Unsupported { .. } => empty(),
        }
    }
}

/// Describe the editor for `field` showing `current`.
pub fn render_field_editor(field: &TemplateField, current: &Value) -> FieldEditor {
    match &field.field_type {
        FieldType::Text => FieldEditor::Text {
            value: as_text(current),
        },
        FieldType::Textarea => FieldEditor::Textarea {
            value: as_text(current),
        },
        FieldType::Number => FieldEditor::Number {
            value: match current {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
                _ => None,
            },
        },
        FieldType::Date => FieldEditor::Date {
            value: match current {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
                _ => None,
            },
        },
        FieldType::Select => FieldEditor::Select {
            options: field.options.clone(),
            selected: match current {
                Value::String(s) if field.options.contains(s) => Some(s.clone()),
                _ => None,
            },
        },
        FieldType::Checkbox => FieldEditor::Checkbox {
            checked: match current {
                Value::Bool(b) => *b,
                Value::String(s) => s == "true",
                _ => false,
            },
        },
        FieldType::Other(name) => FieldEditor::Unsupported {
            type_name: name.clone(),
        },
    }
}

/// Parse raw numeric input. Invalid or blank input becomes the empty-string
/// sentinel rather than an error.
pub fn parse_number_input(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .and_then(number_value)
        .unwrap_or_else(empty)
}

fn number_value(v: f64) -> Option<Value> {
    serde_json::Number::from_f64(v).map(Value::Number)
}

fn empty() -> Value {
    Value::String(String::new())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
