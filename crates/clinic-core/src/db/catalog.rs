//! Catalog database operations (products, soins, stock movements).

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_decimal, Database, StoreError, StoreResult};
use crate::models::{CatalogItem, Product, Soin, SoinCategory, StockMovement};
use crate::store::CatalogStore;

impl CatalogStore for Database {
    fn upsert_product(&self, product: &Product) -> StoreResult<i64> {
        CatalogItem::Product(product.clone())
            .check_invariants()
            .map_err(StoreError::Constraint)?;
        if product.id > 0 {
            self.conn.execute(
                r#"
                INSERT INTO products (id, name, unit_price, stock, description, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    unit_price = excluded.unit_price,
                    stock = excluded.stock,
                    description = excluded.description,
                    updated_at = datetime('now')
                "#,
                params![
                    product.id,
                    product.name,
                    product.unit_price.to_string(),
                    product.stock,
                    product.description,
                ],
            )?;
            return Ok(product.id);
        }

        self.conn.execute(
            r#"
            INSERT INTO products (name, unit_price, stock, description)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                product.name,
                product.unit_price.to_string(),
                product.stock,
                product.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_product(&self, id: i64) -> StoreResult<Option<Product>> {
        self.conn
            .query_row(
                "SELECT id, name, unit_price, stock, description FROM products WHERE id = ?",
                [id],
                product_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, unit_price, stock, description FROM products ORDER BY name",
        )?;
        let rows = stmt.query_map([], product_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?.try_into()?);
        }
        Ok(products)
    }

    fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM products WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn upsert_soin(&self, soin: &Soin) -> StoreResult<i64> {
        CatalogItem::Service(soin.clone())
            .check_invariants()
            .map_err(StoreError::Constraint)?;
        if soin.id > 0 {
            self.conn.execute(
                r#"
                INSERT INTO soins (id, name, unit_price, category, description, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    unit_price = excluded.unit_price,
                    category = excluded.category,
                    description = excluded.description,
                    updated_at = datetime('now')
                "#,
                params![
                    soin.id,
                    soin.name,
                    soin.unit_price.to_string(),
                    soin.category.as_str(),
                    soin.description,
                ],
            )?;
            return Ok(soin.id);
        }

        self.conn.execute(
            r#"
            INSERT INTO soins (name, unit_price, category, description)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                soin.name,
                soin.unit_price.to_string(),
                soin.category.as_str(),
                soin.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_soin(&self, id: i64) -> StoreResult<Option<Soin>> {
        self.conn
            .query_row(
                "SELECT id, name, unit_price, category, description FROM soins WHERE id = ?",
                [id],
                soin_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_soins(&self) -> StoreResult<Vec<Soin>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, unit_price, category, description FROM soins ORDER BY name")?;
        let rows = stmt.query_map([], soin_row)?;

        let mut soins = Vec::new();
        for row in rows {
            soins.push(row?.try_into()?);
        }
        Ok(soins)
    }

    fn delete_soin(&self, id: i64) -> StoreResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM soins WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn record_stock_movement(&self, movement: &StockMovement) -> StoreResult<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let (name, stock): (String, i64) = tx
            .query_row(
                "SELECT name, stock FROM products WHERE id = ?",
                [movement.product_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("product {}", movement.product_id)))?;

        let new_stock = movement.apply_to(stock).ok_or_else(|| {
            StoreError::Constraint(format!("Stock cannot go negative for {}", name))
        })?;

        tx.execute(
            "UPDATE products SET stock = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![movement.product_id, new_stock],
        )?;
        tx.execute(
            r#"
            INSERT INTO stock_movements (product_id, delta, reason, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                movement.product_id,
                movement.delta,
                movement.reason,
                movement.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(new_stock)
    }

    fn list_stock_movements(&self, product_id: i64) -> StoreResult<Vec<StockMovement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, product_id, delta, reason, created_at
            FROM stock_movements
            WHERE product_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([product_id], |row| {
            Ok(StockMovement {
                id: row.get(0)?,
                product_id: row.get(1)?,
                delta: row.get(2)?,
                reason: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut movements = Vec::new();
        for row in rows {
            movements.push(row?);
        }
        Ok(movements)
    }
}

/// Intermediate row struct for database mapping.
struct ProductRow {
    id: i64,
    name: String,
    unit_price: String,
    stock: i64,
    description: Option<String>,
}

fn product_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        unit_price: row.get(2)?,
        stock: row.get(3)?,
        description: row.get(4)?,
    })
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            unit_price: parse_decimal(&row.unit_price)?,
            stock: row.stock,
            description: row.description,
        })
    }
}

/// Intermediate row struct for database mapping.
struct SoinRow {
    id: i64,
    name: String,
    unit_price: String,
    category: String,
    description: Option<String>,
}

fn soin_row(row: &Row<'_>) -> rusqlite::Result<SoinRow> {
    Ok(SoinRow {
        id: row.get(0)?,
        name: row.get(1)?,
        unit_price: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
    })
}

impl TryFrom<SoinRow> for Soin {
    type Error = StoreError;

    fn try_from(row: SoinRow) -> Result<Self, Self::Error> {
        let category = SoinCategory::parse(&row.category)
            .ok_or_else(|| StoreError::Constraint(format!("Unknown soin category: {}", row.category)))?;
        Ok(Soin {
            id: row.id,
            name: row.name,
            unit_price: parse_decimal(&row.unit_price)?,
            category,
            description: row.description,
        })
    }
}
