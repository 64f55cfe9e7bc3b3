//! Document template and document database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, StoreError, StoreResult};
use crate::models::{Document, DocumentData, DocumentTemplate};
use crate::store::DocumentStore;

impl DocumentStore for Database {
    fn insert_template(&self, template: &DocumentTemplate) -> StoreResult<i64> {
        let sections_json = serde_json::to_string(&template.sections)?;
        self.conn.execute(
            r#"
            INSERT INTO document_templates (name, sections, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                template.name,
                sections_json,
                template.created_by,
                template.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_template(&self, template: &DocumentTemplate) -> StoreResult<bool> {
        let sections_json = serde_json::to_string(&template.sections)?;
        let rows_affected = self.conn.execute(
            "UPDATE document_templates SET name = ?2, sections = ?3 WHERE id = ?1",
            params![template.id, template.name, sections_json],
        )?;
        Ok(rows_affected > 0)
    }

    fn get_template(&self, id: i64) -> StoreResult<Option<DocumentTemplate>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, sections, created_by, created_at
                FROM document_templates
                WHERE id = ?
                "#,
                [id],
                template_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_templates(&self) -> StoreResult<Vec<DocumentTemplate>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, sections, created_by, created_at
            FROM document_templates
            ORDER BY name
            "#,
        )?;
        let rows = stmt.query_map([], template_row)?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?.try_into()?);
        }
        Ok(templates)
    }

    fn delete_template(&self, id: i64) -> StoreResult<bool> {
        let in_use: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE template_id = ?",
            [id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(StoreError::Constraint(format!(
                "Template {} is still used by {} document(s)",
                id, in_use
            )));
        }
        let rows_affected = self
            .conn
            .execute("DELETE FROM document_templates WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn insert_document(&self, document: &Document) -> StoreResult<i64> {
        let data_json = serde_json::to_string(&document.data)?;
        let result = self.conn.execute(
            r#"
            INSERT INTO documents (template_id, patient_cin, data, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                document.template_id,
                document.patient_cin,
                data_json,
                document.created_by,
                document.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Constraint(format!(
                    "Unknown template: {}",
                    document.template_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_document_data(&self, id: i64, data: &DocumentData) -> StoreResult<bool> {
        let data_json = serde_json::to_string(data)?;
        let rows_affected = self.conn.execute(
            "UPDATE documents SET data = ?2 WHERE id = ?1",
            params![id, data_json],
        )?;
        Ok(rows_affected > 0)
    }

    fn get_document(&self, id: i64) -> StoreResult<Option<Document>> {
        self.conn
            .query_row(
                r#"
                SELECT id, template_id, patient_cin, data, created_by, created_at
                FROM documents
                WHERE id = ?
                "#,
                [id],
                document_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_documents_for_patient(&self, cin: &str) -> StoreResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, template_id, patient_cin, data, created_by, created_at
            FROM documents
            WHERE patient_cin = ?
            ORDER BY id DESC
            "#,
        )?;
        let rows = stmt.query_map([cin], document_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.try_into()?);
        }
        Ok(documents)
    }

    fn delete_document(&self, id: i64) -> StoreResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM documents WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct TemplateRow {
    id: i64,
    name: String,
    sections: String,
    created_by: String,
    created_at: String,
}

fn template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        name: row.get(1)?,
        sections: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl TryFrom<TemplateRow> for DocumentTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(DocumentTemplate {
            id: row.id,
            name: row.name,
            created_by: row.created_by,
            created_at: row.created_at,
            sections: serde_json::from_str(&row.sections)?,
        })
    }
}

/// Intermediate row struct for database mapping.
struct DocumentRow {
    id: i64,
    template_id: i64,
    patient_cin: String,
    data: String,
    created_by: String,
    created_at: String,
}

fn document_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        template_id: row.get(1)?,
        patient_cin: row.get(2)?,
        data: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            template_id: row.template_id,
            patient_cin: row.patient_cin,
            data: serde_json::from_str(&row.data)?,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, TemplateField, TemplateSection};
    use serde_json::json;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_template() -> DocumentTemplate {
        DocumentTemplate::new(
            "Consultation".into(),
            "dr.benali".into(),
            vec![TemplateSection {
                title: "Constantes".into(),
                fields: vec![
                    TemplateField::new("Poids", FieldType::Number, true),
                    TemplateField::select("Statut", vec!["Urgent".into(), "Normal".into()], false),
                ],
            }],
        )
    }

    #[test]
    fn test_template_round_trip() {
        let db = setup_db();
        let template = make_template();
        let id = db.insert_template(&template).unwrap();

        let retrieved = db.get_template(id).unwrap().unwrap();
        assert_eq!(retrieved.sections, template.sections);
        assert_eq!(retrieved.sections[0].fields[1].options.len(), 2);
    }

    #[test]
    fn test_document_data_preserves_json_types() {
        let db = setup_db();
        let template_id = db.insert_template(&make_template()).unwrap();

        let mut data = DocumentData::new();
        data.insert("field_1_0_0".into(), json!(0));
        data.insert("field_1_0_1".into(), json!(false));
        let id = db
            .insert_document(&Document::new(template_id, "AB1".into(), data.clone(), "dr".into()))
            .unwrap();

        let retrieved = db.get_document(id).unwrap().unwrap();
        assert_eq!(retrieved.data, data);
        assert_eq!(retrieved.template_id, template_id);
    }

    #[test]
    fn test_document_requires_template() {
        let db = setup_db();
        let doc = Document::new(99, "AB1".into(), DocumentData::new(), "dr".into());
        assert!(matches!(db.insert_document(&doc), Err(StoreError::Constraint(_))));
    }

    #[test]
    fn test_update_data_keeps_template() {
        let db = setup_db();
        let template_id = db.insert_template(&make_template()).unwrap();
        let id = db
            .insert_document(&Document::new(template_id, "AB1".into(), DocumentData::new(), "dr".into()))
            .unwrap();

        let mut data = DocumentData::new();
        data.insert("field_1_0_0".into(), json!(72.5));
        assert!(db.update_document_data(id, &data).unwrap());

        let retrieved = db.get_document(id).unwrap().unwrap();
        assert_eq!(retrieved.template_id, template_id);
        assert_eq!(retrieved.data["field_1_0_0"], json!(72.5));
    }

    #[test]
    fn test_delete_template_in_use() {
        let db = setup_db();
        let template_id = db.insert_template(&make_template()).unwrap();
        let doc_id = db
            .insert_document(&Document::new(template_id, "AB1".into(), DocumentData::new(), "dr".into()))
            .unwrap();

        assert!(matches!(
            db.delete_template(template_id),
            Err(StoreError::Constraint(_))
        ));

        db.delete_document(doc_id).unwrap();
        assert!(db.delete_template(template_id).unwrap());
    }
}
