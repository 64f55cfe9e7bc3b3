//! SQLite schema definition.

/// Complete database schema for the clinic core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    cin TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    date_of_birth TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name);

-- ============================================================================
-- Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    unit_price TEXT NOT NULL CHECK (CAST(unit_price AS REAL) >= 0), -- decimal as text
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    description TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS soins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    unit_price TEXT NOT NULL CHECK (CAST(unit_price AS REAL) >= 0), -- decimal as text
    category TEXT NOT NULL,
    description TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    delta INTEGER NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movements_product ON stock_movements(product_id);

-- ============================================================================
-- Invoices
-- ============================================================================

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_cin TEXT NOT NULL,
    issue_date TEXT NOT NULL,                    -- YYYY-MM-DD
    status TEXT NOT NULL DEFAULT 'draft',        -- draft, sent, paid, cancelled, overdue
    notes TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_invoices_patient ON invoices(patient_cin);
CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status);

-- Line items capture name and price at invoice time; no FK to the catalog
CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    item_id INTEGER,
    kind TEXT NOT NULL CHECK (kind IN ('product', 'service')),
    name TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_invoice_items_invoice ON invoice_items(invoice_id, position);

-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS document_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sections TEXT NOT NULL DEFAULT '[]',         -- JSON array of sections
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES document_templates(id),
    patient_cin TEXT NOT NULL,
    data TEXT NOT NULL DEFAULT '{}',             -- JSON object keyed by field key
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_patient ON documents(patient_cin);
CREATE INDEX IF NOT EXISTS idx_documents_template ON documents(template_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_item_kind_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO invoices (patient_cin, issue_date, created_by, created_at) VALUES ('AB1', '2024-01-01', 'admin', 'now')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO invoice_items (invoice_id, position, kind, name, quantity, unit_price) VALUES (1, 0, 'gift', 'x', 1, '1')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO invoice_items (invoice_id, position, kind, name, quantity, unit_price) VALUES (1, 0, 'service', 'x', 1, '1')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_negative_stock_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO products (name, unit_price, stock) VALUES ('x', '1', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for sql in [
            "INSERT INTO products (name, unit_price) VALUES ('x', '-0.01')",
            "INSERT INTO soins (name, unit_price, category) VALUES ('x', '-5', 'autre')",
        ] {
            assert!(conn.execute(sql, []).is_err());
        }
        assert!(conn
            .execute("INSERT INTO soins (name, unit_price, category) VALUES ('x', '0', 'autre')", [])
            .is_ok());
    }
}
