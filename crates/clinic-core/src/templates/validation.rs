//! Template and document validation.

use serde_json::Value;

use super::keys::{compute_field_key, lookup_field_value};
use crate::models::{DocumentData, DocumentTemplate, FieldType};

/// Check a template's structure. Messages follow template order.
pub fn validate_document_template(template: &DocumentTemplate) -> Vec<String> {
    let mut errors = Vec::new();

    if template.name.trim().is_empty() {
        errors.push("Le nom du modèle est requis".to_string());
    }
    if template.created_by.trim().is_empty() {
        errors.push("Le créateur du modèle est requis".to_string());
    }
    if template.sections.is_empty() {
        errors.push("Au moins une section est requise".to_string());
    }

    for (s, section) in template.sections.iter().enumerate() {
        let sn = s + 1;
        if section.title.trim().is_empty() {
            errors.push(format!("Section {} : le titre est requis", sn));
        }
        if section.fields.is_empty() {
            errors.push(format!("Section {} : au moins un champ est requis", sn));
        }

        for (f, field) in section.fields.iter().enumerate() {
            let fn_ = f + 1;
            if field.name.trim().is_empty() {
                errors.push(format!("Section {}, champ {} : le nom est requis", sn, fn_));
            }
            if !field.field_type.is_recognized() {
                errors.push(format!(
                    "Section {}, champ {} : type de champ invalide \"{}\"",
                    sn,
                    fn_,
                    field.field_type.as_str()
                ));
            }
            if field.field_type == FieldType::Select
                && !field.options.iter().any(|o| !o.trim().is_empty())
            {
                errors.push(format!(
                    "Section {}, champ {} : une liste doit avoir au moins une option",
                    sn, fn_
                ));
            }
        }
    }

    errors
}

/// Whether a stored value counts as filled in.
///
/// `null`, a missing key and `""` are absent; `false` and `0` are present.
pub fn is_value_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// One message per required field without a value, in template order.
///
/// Values are read by positional key, falling back to the field label for
/// documents written before positional keys.
pub fn validate_document_against_template(
    data: &DocumentData,
    template: &DocumentTemplate,
) -> Vec<String> {
    template
        .fields()
        .filter(|(_, _, field)| field.required)
        .filter(|(s, f, field)| {
            let key = compute_field_key(template.id, *s, *f);
            !is_value_present(lookup_field_value(data, &key, Some(&field.name)))
        })
        .map(|(_, _, field)| format!("Le champ \"{}\" est requis", field.name))
        .collect()
}
