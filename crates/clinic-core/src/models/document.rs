//! Dynamic document models: templates (sections of typed fields) and the
//! documents filled in from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field values keyed by storage key. Values are JSON scalars.
pub type DocumentData = BTreeMap<String, serde_json::Value>;

/// Field input type.
///
/// Unknown type names survive deserialization as `Other` so that template
/// validation can report them instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Number,
    Textarea,
    Date,
    Select,
    Checkbox,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Other(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => FieldType::Text,
            "number" => FieldType::Number,
            "textarea" => FieldType::Textarea,
            "date" => FieldType::Date,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            _ => FieldType::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

/// A single typed field in a template section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateField {
    /// Display label
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Allowed values, only meaningful for `select`
    #[serde(default)]
    pub options: Vec<String>,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            options: Vec::new(),
        }
    }

    pub fn select(name: impl Into<String>, options: Vec<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Select,
            required,
            options,
        }
    }
}

/// A titled group of fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSection {
    pub title: String,
    pub fields: Vec<TemplateField>,
}

/// Schema of a dynamic clinical document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentTemplate {
    /// Storage identifier (0 until persisted)
    pub id: i64,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub sections: Vec<TemplateSection>,
}

impl DocumentTemplate {
    pub fn new(name: String, created_by: String, sections: Vec<TemplateSection>) -> Self {
        Self {
            id: 0,
            name,
            created_by,
            created_at: chrono::Utc::now().to_rfc3339(),
            sections,
        }
    }

    /// Walk every field in section order, then field order.
    pub fn fields(&self) -> impl Iterator<Item = (usize, usize, &TemplateField)> {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section
                .fields
                .iter()
                .enumerate()
                .map(move |(f, field)| (s, f, field))
        })
    }

    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }
}

/// A document instance bound to a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Storage identifier (0 until persisted)
    pub id: i64,
    /// Bound template, fixed after creation
    pub template_id: i64,
    /// Patient CIN
    pub patient_cin: String,
    pub data: DocumentData,
    pub created_by: String,
    pub created_at: String,
}

impl Document {
    pub fn new(template_id: i64, patient_cin: String, data: DocumentData, created_by: String) -> Self {
        Self {
            id: 0,
            template_id,
            patient_cin,
            data,
            created_by,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parses_unknown() {
        let field: TemplateField =
            serde_json::from_str(r#"{"name":"Poids","type":"slider","required":true}"#).unwrap();
        assert_eq!(field.field_type, FieldType::Other("slider".into()));
        assert!(!field.field_type.is_recognized());
        assert!(field.options.is_empty());
    }

    #[test]
    fn test_field_type_serializes_as_string() {
        let field = TemplateField::new("Date", FieldType::Date, false);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "date");
    }

    #[test]
    fn test_fields_traversal_order() {
        let template = DocumentTemplate::new(
            "Bilan".into(),
            "admin".into(),
            vec![
                TemplateSection {
                    title: "A".into(),
                    fields: vec![
                        TemplateField::new("a1", FieldType::Text, false),
                        TemplateField::new("a2", FieldType::Text, false),
                    ],
                },
                TemplateSection {
                    title: "B".into(),
                    fields: vec![TemplateField::new("b1", FieldType::Number, true)],
                },
            ],
        );

        let order: Vec<_> = template.fields().map(|(s, f, field)| (s, f, field.name.as_str())).collect();
        assert_eq!(order, vec![(0, 0, "a1"), (0, 1, "a2"), (1, 0, "b1")]);
        assert_eq!(template.field_count(), 3);
    }
}
