//! Clinic Core Library
//!
//! Billing and dynamic-document rules for a small clinic, with SQLite
//! storage and a UniFFI surface for native hosts.
//!
//! # Architecture
//!
//! ```text
//!   Host UI ──► ClinicCore (FFI) ──► ClinicService ──► validate ──► ClinicStore
//!                                        │                            │
//!                                        │                  ┌─────────┴─────────┐
//!                                        ▼                  ▼                   ▼
//!                                  billing / templates   Database         MemoryStore
//!                                  (pure rules)          (SQLite)         (tests)
//! ```
//!
//! # Core Principle
//!
//! **Totals are always derived.** Invoice totals are recomputed from line
//! items with two-step rounding and are never stored.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Invoice, Product, Soin, DocumentTemplate, etc.)
//! - [`billing`]: Totals, invoice validation and catalog lookup
//! - [`templates`]: Field keys, field editors and document validation
//! - [`store`]: Storage ports and the in-memory store
//! - [`db`]: SQLite storage
//! - [`service`]: Validate-then-persist operations
//! - [`export`]: Invoice export
//! - [`config`], [`logging`]: Environment configuration and tracing setup

pub mod billing;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod models;
pub mod service;
pub mod store;
pub mod templates;

// Re-export commonly used types
pub use billing::{CatalogLookup, InvoiceTotals, TAX_RATE_PERCENT};
pub use config::CoreConfig;
pub use db::{Database, StoreError};
pub use models::{
    CatalogItem, Document, DocumentData, DocumentTemplate, FieldType, Invoice, InvoiceForm,
    InvoiceLineItem, InvoiceStatus, ItemKind, Patient, Product, Soin, SoinCategory,
    StockMovement, TemplateField, TemplateSection,
};
pub use service::{ClinicError, ClinicService};
pub use store::{ClinicStore, MemoryStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use store::{CatalogStore, DocumentStore, InvoiceStore, PatientStore};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicCoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation messages, one per line
    #[error("{0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for ClinicCoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ClinicCoreError::NotFound(what),
            other => ClinicCoreError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ClinicError> for ClinicCoreError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::Validation(errors) => ClinicCoreError::ValidationError(errors.join("\n")),
            ClinicError::NotFound(what) => ClinicCoreError::NotFound(what),
            ClinicError::Storage(msg) => ClinicCoreError::DatabaseError(msg),
        }
    }
}

impl From<billing::LookupError> for ClinicCoreError {
    fn from(e: billing::LookupError) -> Self {
        ClinicError::from(e).into()
    }
}

impl From<billing::AmountOverflow> for ClinicCoreError {
    fn from(e: billing::AmountOverflow) -> Self {
        ClinicCoreError::InvalidInput(e.to_string())
    }
}

impl From<export::ExportError> for ClinicCoreError {
    fn from(e: export::ExportError) -> Self {
        match e {
            export::ExportError::Store(e) => e.into(),
            export::ExportError::Amount(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for ClinicCoreError {
    fn from(e: serde_json::Error) -> Self {
        ClinicCoreError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicCoreError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_money(s: &str) -> Result<Decimal, ClinicCoreError> {
    Decimal::from_str(s.trim())
        .map_err(|_| ClinicCoreError::InvalidInput(format!("Invalid amount: {}", s)))
}

fn parse_kind(s: &str) -> Result<ItemKind, ClinicCoreError> {
    ItemKind::parse(s).ok_or_else(|| ClinicCoreError::InvalidInput(format!("Unknown item kind: {}", s)))
}

fn parse_status(s: &str) -> Result<InvoiceStatus, ClinicCoreError> {
    InvoiceStatus::parse(s)
        .ok_or_else(|| ClinicCoreError::InvalidInput(format!("Unknown invoice status: {}", s)))
}

fn parse_data(data_json: &str) -> Result<DocumentData, ClinicCoreError> {
    Ok(serde_json::from_str(data_json)?)
}

// =========================================================================
// Pure Rule Functions (exported to FFI)
// =========================================================================

/// Totals for a set of line items, amounts as decimal strings.
#[uniffi::export]
pub fn compute_invoice_totals(items: Vec<FfiLineItem>) -> Result<FfiTotals, ClinicCoreError> {
    let items = items
        .into_iter()
        .map(InvoiceLineItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(billing::compute_invoice_totals(&items)?.into())
}

/// Validation messages for an invoice form, empty when valid.
#[uniffi::export]
pub fn validate_invoice(form: FfiInvoiceForm) -> Result<Vec<String>, ClinicCoreError> {
    let form = InvoiceForm::try_from(form)?;
    Ok(billing::validate_invoice(&form))
}

/// Validation messages for a template given as JSON.
#[uniffi::export]
pub fn validate_document_template(template_json: String) -> Result<Vec<String>, ClinicCoreError> {
    let template: DocumentTemplate = serde_json::from_str(&template_json)?;
    Ok(templates::validate_document_template(&template))
}

/// One message per required field missing from `data_json`.
#[uniffi::export]
pub fn validate_document_against_template(
    data_json: String,
    template_json: String,
) -> Result<Vec<String>, ClinicCoreError> {
    let data = parse_data(&data_json)?;
    let template: DocumentTemplate = serde_json::from_str(&template_json)?;
    Ok(templates::validate_document_against_template(&data, &template))
}

#[uniffi::export]
pub fn compute_field_key(template_id: i64, section_index: u32, field_index: u32) -> String {
    templates::compute_field_key(template_id, section_index as usize, field_index as usize)
}

/// Stored value as JSON, `""` when absent.
#[uniffi::export]
pub fn get_field_value(
    data_json: String,
    key: String,
    fallback_name: Option<String>,
) -> Result<String, ClinicCoreError> {
    let data = parse_data(&data_json)?;
    let value = templates::get_field_value(&data, &key, fallback_name.as_deref());
    Ok(serde_json::to_string(&value)?)
}

/// New data map (JSON) with `value_json` stored under `key`.
#[uniffi::export]
pub fn set_field_value(
    data_json: String,
    key: String,
    value_json: String,
    fallback_name: Option<String>,
) -> Result<String, ClinicCoreError> {
    let data = parse_data(&data_json)?;
    let value: serde_json::Value = serde_json::from_str(&value_json)?;
    let updated = templates::set_field_value(&data, &key, value, fallback_name.as_deref());
    Ok(serde_json::to_string(&updated)?)
}

/// Editor descriptor (JSON) for a field (JSON) showing `current_json`.
#[uniffi::export]
pub fn render_field_editor(
    field_json: String,
    current_json: String,
) -> Result<String, ClinicCoreError> {
    let field: TemplateField = serde_json::from_str(&field_json)?;
    let current: serde_json::Value = serde_json::from_str(&current_json)?;
    Ok(serde_json::to_string(&templates::render_field_editor(&field, &current))?)
}

/// Parse raw numeric input into a JSON value, `""` when invalid.
#[uniffi::export]
pub fn parse_number_input(raw: String) -> String {
    templates::parse_number_input(&raw).to_string()
}

/// Install the tracing subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    logging::init_logging(&filter)
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicCore>, ClinicCoreError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, ClinicCoreError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Read `CLINIC_DB_PATH` / `CLINIC_LOG` (and `.env`), set up logging and
/// open the configured database.
#[uniffi::export]
pub fn open_database_from_env() -> Result<Arc<ClinicCore>, ClinicCoreError> {
    let config = CoreConfig::from_env();
    logging::init_logging(&config.log_filter);
    tracing::info!(path = %config.database_path.display(), "opening clinic database");

    let db = Database::open(&config.database_path)?;
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a product. Returns its id.
    pub fn upsert_product(&self, product: FfiProduct) -> Result<i64, ClinicCoreError> {
        let product = Product::try_from(product)?;
        let db = self.db.lock()?;
        Ok(db.upsert_product(&product)?)
    }

    pub fn get_product(&self, id: i64) -> Result<Option<FfiProduct>, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.get_product(id)?.map(|p| p.into()))
    }

    pub fn list_products(&self) -> Result<Vec<FfiProduct>, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.list_products()?.into_iter().map(|p| p.into()).collect())
    }

    pub fn delete_product(&self, id: i64) -> Result<bool, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.delete_product(id)?)
    }

    /// Add or update a service. Returns its id.
    pub fn upsert_soin(&self, soin: FfiSoin) -> Result<i64, ClinicCoreError> {
        let soin = Soin::try_from(soin)?;
        let db = self.db.lock()?;
        Ok(db.upsert_soin(&soin)?)
    }

    pub fn get_soin(&self, id: i64) -> Result<Option<FfiSoin>, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.get_soin(id)?.map(|s| s.into()))
    }

    pub fn list_soins(&self) -> Result<Vec<FfiSoin>, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.list_soins()?.into_iter().map(|s| s.into()).collect())
    }

    pub fn delete_soin(&self, id: i64) -> Result<bool, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.delete_soin(id)?)
    }

    /// Search products or services by name.
    pub fn search_catalog(
        &self,
        kind: String,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiCatalogMatch>, ClinicCoreError> {
        let kind = parse_kind(&kind)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        let matches = service.catalog().search(kind, &query, limit as usize)?;
        Ok(matches.into_iter().map(|m| m.into()).collect())
    }

    /// Fill a line from the catalog. Unknown items leave the line as it was.
    pub fn select_catalog_item(
        &self,
        line: FfiLineItem,
        kind: String,
        id: i64,
    ) -> Result<FfiLineItem, ClinicCoreError> {
        let kind = parse_kind(&kind)?;
        let mut line = InvoiceLineItem::try_from(line)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        service.catalog().select_item(&mut line, kind, id)?;
        Ok(line.into())
    }

    /// Apply a stock adjustment. Returns the new stock level.
    pub fn record_stock_movement(
        &self,
        product_id: i64,
        delta: i64,
        reason: Option<String>,
    ) -> Result<i64, ClinicCoreError> {
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.record_stock_movement(&StockMovement::new(product_id, delta, reason))?)
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn register_patient(&self, patient: FfiPatient) -> Result<FfiPatient, ClinicCoreError> {
        let patient: Patient = patient.into();
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        service.register_patient(&patient)?;
        Ok(patient.into())
    }

    pub fn get_patient(&self, cin: String) -> Result<Option<FfiPatient>, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(&cin)?.map(|p| p.into()))
    }

    /// Search patients by CIN or name.
    pub fn search_patients(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, ClinicCoreError> {
        let db = self.db.lock()?;
        let patients = db.search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    pub fn create_invoice(&self, form: FfiInvoiceForm) -> Result<FfiInvoice, ClinicCoreError> {
        let form = InvoiceForm::try_from(form)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        service.create_invoice(&form)?.try_into()
    }

    /// Replace an invoice's header and line items.
    pub fn update_invoice(
        &self,
        id: i64,
        form: FfiInvoiceForm,
    ) -> Result<FfiInvoice, ClinicCoreError> {
        let form = InvoiceForm::try_from(form)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        service.update_invoice(id, &form)?.try_into()
    }

    pub fn set_invoice_status(&self, id: i64, status: String) -> Result<(), ClinicCoreError> {
        let status = parse_status(&status)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.set_invoice_status(id, status)?)
    }

    pub fn get_invoice(&self, id: i64) -> Result<Option<FfiInvoice>, ClinicCoreError> {
        let db = self.db.lock()?;
        db.get_invoice(id)?.map(FfiInvoice::try_from).transpose()
    }

    /// Invoices, newest first.
    pub fn list_invoices(&self) -> Result<Vec<FfiInvoice>, ClinicCoreError> {
        let db = self.db.lock()?;
        db.list_invoices()?
            .into_iter()
            .map(FfiInvoice::try_from)
            .collect()
    }

    pub fn list_invoices_for_patient(&self, cin: String) -> Result<Vec<FfiInvoice>, ClinicCoreError> {
        let db = self.db.lock()?;
        db.list_invoices_for_patient(&cin)?
            .into_iter()
            .map(FfiInvoice::try_from)
            .collect()
    }

    /// Delete an invoice together with its line items.
    pub fn delete_invoice(&self, id: i64) -> Result<(), ClinicCoreError> {
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.delete_invoice(id)?)
    }

    // =========================================================================
    // Template and Document Operations
    // =========================================================================

    /// Create a template from JSON. Returns its id.
    pub fn create_template(&self, template_json: String) -> Result<i64, ClinicCoreError> {
        let template: DocumentTemplate = serde_json::from_str(&template_json)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.create_template(&template)?.id)
    }

    pub fn update_template(&self, id: i64, template_json: String) -> Result<(), ClinicCoreError> {
        let mut template: DocumentTemplate = serde_json::from_str(&template_json)?;
        template.id = id;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.update_template(&template)?)
    }

    /// Template as JSON.
    pub fn get_template(&self, id: i64) -> Result<Option<String>, ClinicCoreError> {
        let db = self.db.lock()?;
        match db.get_template(id)? {
            Some(template) => Ok(Some(serde_json::to_string(&template)?)),
            None => Ok(None),
        }
    }

    /// All templates as a JSON array.
    pub fn list_templates(&self) -> Result<String, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(serde_json::to_string(&db.list_templates()?)?)
    }

    pub fn delete_template(&self, id: i64) -> Result<bool, ClinicCoreError> {
        let db = self.db.lock()?;
        Ok(db.delete_template(id)?)
    }

    pub fn create_document(
        &self,
        template_id: i64,
        patient_cin: String,
        data_json: String,
        created_by: String,
    ) -> Result<FfiDocument, ClinicCoreError> {
        let data = parse_data(&data_json)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        FfiDocument::try_from(service.create_document(template_id, &patient_cin, &data, &created_by)?)
    }

    pub fn update_document(&self, id: i64, data_json: String) -> Result<FfiDocument, ClinicCoreError> {
        let data = parse_data(&data_json)?;
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        FfiDocument::try_from(service.update_document(id, &data)?)
    }

    pub fn get_document(&self, id: i64) -> Result<Option<FfiDocument>, ClinicCoreError> {
        let db = self.db.lock()?;
        db.get_document(id)?.map(FfiDocument::try_from).transpose()
    }

    pub fn list_documents_for_patient(
        &self,
        cin: String,
    ) -> Result<Vec<FfiDocument>, ClinicCoreError> {
        let db = self.db.lock()?;
        db.list_documents_for_patient(&cin)?
            .into_iter()
            .map(FfiDocument::try_from)
            .collect()
    }

    pub fn delete_document(&self, id: i64) -> Result<(), ClinicCoreError> {
        let db = self.db.lock()?;
        let service = ClinicService::new(&*db);
        Ok(service.delete_document(id)?)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export all invoices as JSON.
    pub fn export_invoices_json(&self) -> Result<String, ClinicCoreError> {
        let db = self.db.lock()?;
        let batch = export::InvoiceExporter::new(&*db).export_all()?;
        Ok(batch.to_json()?)
    }

    /// Export all invoices as CSV.
    pub fn export_invoices_csv(&self) -> Result<String, ClinicCoreError> {
        let db = self.db.lock()?;
        let batch = export::InvoiceExporter::new(&*db).export_all()?;
        Ok(batch.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe invoice line. Amounts are decimal strings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLineItem {
    pub item_id: Option<i64>,
    /// "product" or "service"
    pub kind: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: String,
}

impl TryFrom<FfiLineItem> for InvoiceLineItem {
    type Error = ClinicCoreError;

    fn try_from(item: FfiLineItem) -> Result<Self, Self::Error> {
        Ok(InvoiceLineItem {
            item_id: item.item_id,
            kind: parse_kind(&item.kind)?,
            name: item.name,
            quantity: item.quantity,
            unit_price: parse_money(&item.unit_price)?,
        })
    }
}

impl From<InvoiceLineItem> for FfiLineItem {
    fn from(item: InvoiceLineItem) -> Self {
        Self {
            item_id: item.item_id,
            kind: item.kind.as_str().to_string(),
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
        }
    }
}

/// FFI-safe invoice totals.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTotals {
    pub pretax_total: String,
    pub tax_amount: String,
    pub tax_rate: u32,
    pub grand_total: String,
}

impl From<InvoiceTotals> for FfiTotals {
    fn from(totals: InvoiceTotals) -> Self {
        Self {
            pretax_total: totals.pretax_total.to_string(),
            tax_amount: totals.tax_amount.to_string(),
            tax_rate: TAX_RATE_PERCENT,
            grand_total: totals.grand_total.to_string(),
        }
    }
}

/// FFI-safe invoice form. Blank dates and statuses count as unset.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoiceForm {
    pub patient_cin: String,
    /// YYYY-MM-DD
    pub issue_date: Option<String>,
    pub created_by: String,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<FfiLineItem>,
}

impl TryFrom<FfiInvoiceForm> for InvoiceForm {
    type Error = ClinicCoreError;

    fn try_from(form: FfiInvoiceForm) -> Result<Self, Self::Error> {
        let issue_date = match form.issue_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| ClinicCoreError::InvalidInput(format!("Invalid date: {}", s)))?,
            ),
        };
        let status = match form.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_status(s)?),
        };

        Ok(InvoiceForm {
            patient_cin: form.patient_cin,
            issue_date,
            created_by: form.created_by,
            status,
            notes: form.notes,
            items: form
                .items
                .into_iter()
                .map(InvoiceLineItem::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// FFI-safe invoice with derived totals.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoice {
    pub id: i64,
    pub patient_cin: String,
    pub issue_date: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub items: Vec<FfiLineItem>,
    pub totals: FfiTotals,
}

impl TryFrom<Invoice> for FfiInvoice {
    type Error = ClinicCoreError;

    fn try_from(invoice: Invoice) -> Result<Self, Self::Error> {
        let totals = invoice.totals()?.into();
        Ok(Self {
            id: invoice.id,
            patient_cin: invoice.patient_cin,
            issue_date: invoice.issue_date.format("%Y-%m-%d").to_string(),
            status: invoice.status.as_str().to_string(),
            notes: invoice.notes,
            created_by: invoice.created_by,
            created_at: invoice.created_at,
            items: invoice.items.into_iter().map(|i| i.into()).collect(),
            totals,
        })
    }
}

/// FFI-safe product.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProduct {
    pub id: i64,
    pub name: String,
    pub unit_price: String,
    pub stock: i64,
    pub description: Option<String>,
}

impl From<Product> for FfiProduct {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            unit_price: product.unit_price.to_string(),
            stock: product.stock,
            description: product.description,
        }
    }
}

impl TryFrom<FfiProduct> for Product {
    type Error = ClinicCoreError;

    fn try_from(product: FfiProduct) -> Result<Self, Self::Error> {
        Ok(Product {
            id: product.id,
            name: product.name,
            unit_price: parse_money(&product.unit_price)?,
            stock: product.stock,
            description: product.description,
        })
    }
}

/// FFI-safe service.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSoin {
    pub id: i64,
    pub name: String,
    pub unit_price: String,
    pub category: String,
    pub description: Option<String>,
}

impl From<Soin> for FfiSoin {
    fn from(soin: Soin) -> Self {
        Self {
            id: soin.id,
            name: soin.name,
            unit_price: soin.unit_price.to_string(),
            category: soin.category.as_str().to_string(),
            description: soin.description,
        }
    }
}

impl TryFrom<FfiSoin> for Soin {
    type Error = ClinicCoreError;

    fn try_from(soin: FfiSoin) -> Result<Self, Self::Error> {
        let category = SoinCategory::parse(&soin.category).ok_or_else(|| {
            ClinicCoreError::InvalidInput(format!("Unknown category: {}", soin.category))
        })?;
        Ok(Soin {
            id: soin.id,
            name: soin.name,
            unit_price: parse_money(&soin.unit_price)?,
            category,
            description: soin.description,
        })
    }
}

/// FFI-safe catalog search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogMatch {
    pub kind: String,
    pub id: i64,
    pub name: String,
    pub unit_price: String,
    pub score: f64,
}

impl From<billing::CatalogMatch> for FfiCatalogMatch {
    fn from(m: billing::CatalogMatch) -> Self {
        Self {
            kind: m.entry.kind.as_str().to_string(),
            id: m.entry.id,
            name: m.entry.name,
            unit_price: m.entry.unit_price.to_string(),
            score: m.score,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub cin: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub notes: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            cin: patient.cin,
            first_name: patient.first_name,
            last_name: patient.last_name,
            phone: patient.phone,
            email: patient.email,
            date_of_birth: patient.date_of_birth,
            notes: patient.notes,
        }
    }
}

impl From<FfiPatient> for Patient {
    fn from(p: FfiPatient) -> Self {
        Patient {
            phone: p.phone,
            email: p.email,
            date_of_birth: p.date_of_birth,
            notes: p.notes,
            ..Patient::new(p.cin, p.first_name, p.last_name)
        }
    }
}

/// FFI-safe document. `data_json` is the field map as a JSON object.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDocument {
    pub id: i64,
    pub template_id: i64,
    pub patient_cin: String,
    pub data_json: String,
    pub created_by: String,
    pub created_at: String,
}

impl TryFrom<Document> for FfiDocument {
    type Error = ClinicCoreError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        Ok(Self {
            data_json: serde_json::to_string(&doc.data)?,
            id: doc.id,
            template_id: doc.template_id,
            patient_cin: doc.patient_cin,
            created_by: doc.created_by,
            created_at: doc.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(kind: &str, price: &str, quantity: i64) -> FfiLineItem {
        FfiLineItem {
            item_id: Some(1),
            kind: kind.into(),
            name: "Article".into(),
            quantity,
            unit_price: price.into(),
        }
    }

    #[test]
    fn test_ffi_totals_are_decimal_strings() {
        let totals = compute_invoice_totals(vec![
            line("product", "100.00", 2),
            line("service", "49.99", 1),
        ])
        .unwrap();
        assert_eq!(totals.pretax_total, "249.99");
        assert_eq!(totals.tax_amount, "50.00");
        assert_eq!(totals.grand_total, "299.99");
        assert_eq!(totals.tax_rate, 20);
    }

    #[test]
    fn test_ffi_rejects_bad_amount() {
        assert!(matches!(
            compute_invoice_totals(vec![line("product", "abc", 1)]),
            Err(ClinicCoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ffi_out_of_range_totals_are_invalid_input() {
        let result = compute_invoice_totals(vec![line("product", "100000000000", i64::MAX)]);
        assert!(matches!(result, Err(ClinicCoreError::InvalidInput(_))));

        let form = FfiInvoiceForm {
            patient_cin: "AB1".into(),
            issue_date: Some("2024-05-02".into()),
            created_by: "reception".into(),
            status: None,
            notes: None,
            items: vec![line("product", "100000000000", i64::MAX)],
        };
        assert_eq!(
            validate_invoice(form).unwrap(),
            vec!["Article 1 : le montant de la ligne est trop élevé".to_string()]
        );
    }

    #[test]
    fn test_ffi_field_value_round_trip() {
        let key = compute_field_key(3, 0, 1);
        assert_eq!(key, "field_3_0_1");

        let data = set_field_value("{}".into(), key.clone(), "false".into(), None).unwrap();
        assert_eq!(get_field_value(data, key, None).unwrap(), "false");
        assert_eq!(
            get_field_value("{}".into(), "field_3_0_0".into(), None).unwrap(),
            "\"\""
        );
    }

    #[test]
    fn test_core_invoice_flow() {
        let core = open_database_in_memory().unwrap();
        core.register_patient(FfiPatient {
            cin: "AB1".into(),
            first_name: "Salma".into(),
            last_name: "Idrissi".into(),
            phone: None,
            email: None,
            date_of_birth: None,
            notes: None,
        })
        .unwrap();
        core.upsert_product(FfiProduct {
            id: 0,
            name: "Omega 3".into(),
            unit_price: "100.00".into(),
            stock: 5,
            description: None,
        })
        .unwrap();
        core.upsert_soin(FfiSoin {
            id: 0,
            name: "Massage".into(),
            unit_price: "49.99".into(),
            category: "therapie".into(),
            description: None,
        })
        .unwrap();

        let form = FfiInvoiceForm {
            patient_cin: "AB1".into(),
            issue_date: Some("2024-05-02".into()),
            created_by: "reception".into(),
            status: None,
            notes: None,
            items: vec![line("product", "100.00", 2), line("service", "49.99", 1)],
        };
        assert!(validate_invoice(form.clone()).unwrap().is_empty());

        let invoice = core.create_invoice(form).unwrap();
        assert_eq!(invoice.status, "draft");
        assert_eq!(invoice.totals.grand_total, "299.99");

        core.set_invoice_status(invoice.id, "paid".into()).unwrap();
        assert!(core.export_invoices_csv().unwrap().contains("paid"));

        core.delete_invoice(invoice.id).unwrap();
        assert!(core.get_invoice(invoice.id).unwrap().is_none());
    }

    #[test]
    fn test_core_rejects_negative_catalog_price() {
        let core = open_database_in_memory().unwrap();
        let result = core.upsert_product(FfiProduct {
            id: 0,
            name: "Sérum".into(),
            unit_price: "-1.00".into(),
            stock: 0,
            description: None,
        });
        assert!(matches!(result, Err(ClinicCoreError::DatabaseError(_))));
        assert!(core.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_core_validation_error_lists_messages() {
        let core = open_database_in_memory().unwrap();
        let form = FfiInvoiceForm {
            patient_cin: String::new(),
            issue_date: None,
            created_by: "reception".into(),
            status: None,
            notes: None,
            items: vec![],
        };
        match core.create_invoice(form) {
            Err(ClinicCoreError::ValidationError(msg)) => assert_eq!(msg.lines().count(), 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
