//! Invoice database operations.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_decimal, Database, StoreError, StoreResult};
use crate::models::{Invoice, InvoiceLineItem, InvoiceStatus, ItemKind};
use crate::store::InvoiceStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl InvoiceStore for Database {
    fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO invoices (
                patient_cin, issue_date, status, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                invoice.patient_cin,
                invoice.issue_date.format(DATE_FORMAT).to_string(),
                invoice.status.as_str(),
                invoice.notes,
                invoice.created_by,
                invoice.created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_items(&tx, id, &invoice.items)?;
        tx.commit()?;
        Ok(id)
    }

    fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let rows_affected = tx.execute(
            r#"
            UPDATE invoices SET
                patient_cin = ?2,
                issue_date = ?3,
                status = ?4,
                notes = ?5
            WHERE id = ?1
            "#,
            params![
                invoice.id,
                invoice.patient_cin,
                invoice.issue_date.format(DATE_FORMAT).to_string(),
                invoice.status.as_str(),
                invoice.notes,
            ],
        )?;
        if rows_affected == 0 {
            return Ok(false);
        }

        // Replace, never merge
        tx.execute("DELETE FROM invoice_items WHERE invoice_id = ?", [invoice.id])?;
        insert_items(&tx, invoice.id, &invoice.items)?;
        tx.commit()?;
        Ok(true)
    }

    fn set_invoice_status(&self, id: i64, status: InvoiceStatus) -> StoreResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE invoices SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    fn get_invoice(&self, id: i64) -> StoreResult<Option<Invoice>> {
        let header = self
            .conn
            .query_row(
                r#"
                SELECT id, patient_cin, issue_date, status, notes, created_by, created_at
                FROM invoices
                WHERE id = ?
                "#,
                [id],
                invoice_row,
            )
            .optional()?;

        match header {
            Some(row) => Ok(Some(self.hydrate(row)?)),
            None => Ok(None),
        }
    }

    fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_cin, issue_date, status, notes, created_by, created_at
            FROM invoices
            ORDER BY issue_date DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([], invoice_row)?;

        let mut invoices = Vec::new();
        for row in rows {
            invoices.push(self.hydrate(row?)?);
        }
        Ok(invoices)
    }

    fn list_invoices_for_patient(&self, cin: &str) -> StoreResult<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_cin, issue_date, status, notes, created_by, created_at
            FROM invoices
            WHERE patient_cin = ?
            ORDER BY issue_date DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([cin], invoice_row)?;

        let mut invoices = Vec::new();
        for row in rows {
            invoices.push(self.hydrate(row?)?);
        }
        Ok(invoices)
    }

    fn delete_invoice(&self, id: i64) -> StoreResult<bool> {
        // invoice_items rows go with it (ON DELETE CASCADE)
        let rows_affected = self.conn.execute("DELETE FROM invoices WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn count_line_items(&self, invoice_id: i64) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM invoice_items WHERE invoice_id = ?",
            [invoice_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl Database {
    fn hydrate(&self, row: InvoiceRow) -> StoreResult<Invoice> {
        let items = load_items(&self.conn, row.id)?;
        let mut invoice: Invoice = row.try_into()?;
        invoice.items = items;
        Ok(invoice)
    }
}

fn insert_items(conn: &Connection, invoice_id: i64, items: &[InvoiceLineItem]) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO invoice_items (
            invoice_id, position, item_id, kind, name, quantity, unit_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;
    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            invoice_id,
            position as i64,
            item.item_id,
            item.kind.as_str(),
            item.name,
            item.quantity,
            item.unit_price.to_string(),
        ])?;
    }
    Ok(())
}

fn load_items(conn: &Connection, invoice_id: i64) -> StoreResult<Vec<InvoiceLineItem>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT item_id, kind, name, quantity, unit_price
        FROM invoice_items
        WHERE invoice_id = ?
        ORDER BY position
        "#,
    )?;
    let rows = stmt.query_map([invoice_id], |row| {
        Ok((
            row.get::<_, Option<i64>>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (item_id, kind, name, quantity, unit_price) = row?;
        let kind = ItemKind::parse(&kind)
            .ok_or_else(|| StoreError::Constraint(format!("Unknown item kind: {}", kind)))?;
        items.push(InvoiceLineItem {
            item_id,
            kind,
            name,
            quantity,
            unit_price: parse_decimal(&unit_price)?,
        });
    }
    Ok(items)
}

/// Intermediate row struct for database mapping.
struct InvoiceRow {
    id: i64,
    patient_cin: String,
    issue_date: String,
    status: String,
    notes: Option<String>,
    created_by: String,
    created_at: String,
}

fn invoice_row(row: &Row<'_>) -> rusqlite::Result<InvoiceRow> {
    Ok(InvoiceRow {
        id: row.get(0)?,
        patient_cin: row.get(1)?,
        issue_date: row.get(2)?,
        status: row.get(3)?,
        notes: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let issue_date = NaiveDate::parse_from_str(&row.issue_date, DATE_FORMAT)
            .map_err(|_| StoreError::Constraint(format!("Invalid issue date: {}", row.issue_date)))?;
        let status = InvoiceStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Constraint(format!("Unknown invoice status: {}", row.status)))?;

        Ok(Invoice {
            id: row.id,
            patient_cin: row.patient_cin,
            issue_date,
            status,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            items: Vec::new(),
        })
    }
}
