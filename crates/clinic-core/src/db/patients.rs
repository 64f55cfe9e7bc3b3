//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, StoreResult};
use crate::models::Patient;
use crate::store::PatientStore;

const PATIENT_COLUMNS: &str =
    "cin, first_name, last_name, phone, email, date_of_birth, notes, created_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        cin: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        date_of_birth: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl PatientStore for Database {
    fn insert_patient(&self, patient: &Patient) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                cin, first_name, last_name, phone, email,
                date_of_birth, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                patient.cin,
                patient.first_name,
                patient.last_name,
                patient.phone,
                patient.email,
                patient.date_of_birth,
                patient.notes,
                patient.created_at,
            ],
        )?;
        Ok(())
    }

    fn update_patient(&self, patient: &Patient) -> StoreResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                first_name = ?2,
                last_name = ?3,
                phone = ?4,
                email = ?5,
                date_of_birth = ?6,
                notes = ?7
            WHERE cin = ?1
            "#,
            params![
                patient.cin,
                patient.first_name,
                patient.last_name,
                patient.phone,
                patient.email,
                patient.date_of_birth,
                patient.notes,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn get_patient(&self, cin: &str) -> StoreResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE cin = ?", PATIENT_COLUMNS),
                [cin],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], patient_from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?);
        }
        Ok(patients)
    }

    fn delete_patient(&self, cin: &str) -> StoreResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM patients WHERE cin = ?", [cin])?;
        Ok(rows_affected > 0)
    }

    fn search_patients(&self, query: &str, limit: usize) -> StoreResult<Vec<Patient>> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE cin LIKE ?1 OR first_name LIKE ?1 OR last_name LIKE ?1
            ORDER BY last_name, first_name
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], patient_from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?);
        }
        Ok(patients)
    }
}
