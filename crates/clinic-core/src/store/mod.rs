//! Storage ports.
//!
//! Each entity family gets a trait so the rule core can run against SQLite
//! ([`crate::db::Database`]) or the in-memory [`MemoryStore`].

mod memory;

pub use memory::*;

use crate::db::StoreResult;
use crate::models::{
    CatalogItem, Document, DocumentData, DocumentTemplate, Invoice, InvoiceStatus, ItemKind,
    Patient, Product, Soin, StockMovement,
};

/// Patient records keyed by CIN.
pub trait PatientStore {
    fn insert_patient(&self, patient: &Patient) -> StoreResult<()>;
    fn update_patient(&self, patient: &Patient) -> StoreResult<bool>;
    fn get_patient(&self, cin: &str) -> StoreResult<Option<Patient>>;
    fn list_patients(&self) -> StoreResult<Vec<Patient>>;
    fn delete_patient(&self, cin: &str) -> StoreResult<bool>;

    /// Case-insensitive search over CIN and names.
    fn search_patients(&self, query: &str, limit: usize) -> StoreResult<Vec<Patient>> {
        Ok(self
            .list_patients()?
            .into_iter()
            .filter(|p| p.matches(query))
            .take(limit)
            .collect())
    }
}

/// Products, soins and stock movements.
pub trait CatalogStore {
    /// Insert (id 0) or update a product. Returns its id.
    fn upsert_product(&self, product: &Product) -> StoreResult<i64>;
    fn get_product(&self, id: i64) -> StoreResult<Option<Product>>;
    fn list_products(&self) -> StoreResult<Vec<Product>>;
    fn delete_product(&self, id: i64) -> StoreResult<bool>;

    /// Insert (id 0) or update a soin. Returns its id.
    fn upsert_soin(&self, soin: &Soin) -> StoreResult<i64>;
    fn get_soin(&self, id: i64) -> StoreResult<Option<Soin>>;
    fn list_soins(&self) -> StoreResult<Vec<Soin>>;
    fn delete_soin(&self, id: i64) -> StoreResult<bool>;

    /// Apply a movement to a product's stock. Returns the new stock count.
    fn record_stock_movement(&self, movement: &StockMovement) -> StoreResult<i64>;
    fn list_stock_movements(&self, product_id: i64) -> StoreResult<Vec<StockMovement>>;

    fn get_item(&self, kind: ItemKind, id: i64) -> StoreResult<Option<CatalogItem>> {
        match kind {
            ItemKind::Product => Ok(self.get_product(id)?.map(CatalogItem::Product)),
            ItemKind::Service => Ok(self.get_soin(id)?.map(CatalogItem::Service)),
        }
    }
}

/// Invoices and their line items.
pub trait InvoiceStore {
    /// Insert an invoice with its line items. Returns the new id.
    fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<i64>;
    /// Update header fields and replace all line items.
    fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool>;
    fn set_invoice_status(&self, id: i64, status: InvoiceStatus) -> StoreResult<bool>;
    fn get_invoice(&self, id: i64) -> StoreResult<Option<Invoice>>;
    /// Newest first.
    fn list_invoices(&self) -> StoreResult<Vec<Invoice>>;
    /// Remove an invoice together with its line items.
    fn delete_invoice(&self, id: i64) -> StoreResult<bool>;
    /// Number of stored line items referencing an invoice id.
    fn count_line_items(&self, invoice_id: i64) -> StoreResult<usize>;

    fn list_invoices_for_patient(&self, cin: &str) -> StoreResult<Vec<Invoice>> {
        Ok(self
            .list_invoices()?
            .into_iter()
            .filter(|i| i.patient_cin == cin)
            .collect())
    }

    fn list_invoices_by_status(&self, status: InvoiceStatus) -> StoreResult<Vec<Invoice>> {
        Ok(self
            .list_invoices()?
            .into_iter()
            .filter(|i| i.status == status)
            .collect())
    }
}

/// Document templates and documents.
pub trait DocumentStore {
    fn insert_template(&self, template: &DocumentTemplate) -> StoreResult<i64>;
    fn update_template(&self, template: &DocumentTemplate) -> StoreResult<bool>;
    fn get_template(&self, id: i64) -> StoreResult<Option<DocumentTemplate>>;
    fn list_templates(&self) -> StoreResult<Vec<DocumentTemplate>>;
    /// Fails with a constraint error while documents still use the template.
    fn delete_template(&self, id: i64) -> StoreResult<bool>;

    fn insert_document(&self, document: &Document) -> StoreResult<i64>;
    /// Replace a document's data. The template binding never changes.
    fn update_document_data(&self, id: i64, data: &DocumentData) -> StoreResult<bool>;
    fn get_document(&self, id: i64) -> StoreResult<Option<Document>>;
    fn list_documents_for_patient(&self, cin: &str) -> StoreResult<Vec<Document>>;
    fn delete_document(&self, id: i64) -> StoreResult<bool>;
}

/// Everything the clinic service needs from storage.
pub trait ClinicStore: PatientStore + CatalogStore + InvoiceStore + DocumentStore {}

impl<T: PatientStore + CatalogStore + InvoiceStore + DocumentStore + ?Sized> ClinicStore for T {}
