//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{CatalogStore, DocumentStore, InvoiceStore, PatientStore};
use crate::db::{StoreError, StoreResult};
use crate::models::{
    CatalogItem, Document, DocumentData, DocumentTemplate, Invoice, InvoiceStatus, Patient,
    Product, Soin, StockMovement,
};

#[derive(Default)]
struct MemoryState {
    patients: BTreeMap<String, Patient>,
    products: BTreeMap<i64, Product>,
    soins: BTreeMap<i64, Soin>,
    movements: Vec<StockMovement>,
    invoices: BTreeMap<i64, Invoice>,
    templates: BTreeMap<i64, DocumentTemplate>,
    documents: BTreeMap<i64, Document>,
    next_product_id: i64,
    next_soin_id: i64,
    next_movement_id: i64,
    next_invoice_id: i64,
    next_template_id: i64,
    next_document_id: i64,
}

/// Allocate `requested` if non-zero, else the next free id.
fn assign_id(counter: &mut i64, requested: i64) -> i64 {
    if requested > 0 {
        *counter = (*counter).max(requested);
        requested
    } else {
        *counter += 1;
        *counter
    }
}

/// Thread-safe in-memory store. Ids are allocated per entity, starting at 1.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl PatientStore for MemoryStore {
    fn insert_patient(&self, patient: &Patient) -> StoreResult<()> {
        let mut state = self.state()?;
        if state.patients.contains_key(&patient.cin) {
            return Err(StoreError::Constraint(format!(
                "Patient already exists: {}",
                patient.cin
            )));
        }
        state.patients.insert(patient.cin.clone(), patient.clone());
        Ok(())
    }

    fn update_patient(&self, patient: &Patient) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.patients.get_mut(&patient.cin) {
            Some(existing) => {
                *existing = patient.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_patient(&self, cin: &str) -> StoreResult<Option<Patient>> {
        Ok(self.state()?.patients.get(cin).cloned())
    }

    fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let mut patients: Vec<Patient> = self.state()?.patients.values().cloned().collect();
        patients.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(patients)
    }

    fn delete_patient(&self, cin: &str) -> StoreResult<bool> {
        Ok(self.state()?.patients.remove(cin).is_some())
    }
}

impl CatalogStore for MemoryStore {
    fn upsert_product(&self, product: &Product) -> StoreResult<i64> {
        CatalogItem::Product(product.clone())
            .check_invariants()
            .map_err(StoreError::Constraint)?;
        let mut state = self.state()?;
        let id = assign_id(&mut state.next_product_id, product.id);
        let mut stored = product.clone();
        stored.id = id;
        state.products.insert(id, stored);
        Ok(id)
    }

    fn get_product(&self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.state()?.products.get(&id).cloned())
    }

    fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.state()?.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state()?;
        state.movements.retain(|m| m.product_id != id);
        Ok(state.products.remove(&id).is_some())
    }

    fn upsert_soin(&self, soin: &Soin) -> StoreResult<i64> {
        CatalogItem::Service(soin.clone())
            .check_invariants()
            .map_err(StoreError::Constraint)?;
        let mut state = self.state()?;
        let id = assign_id(&mut state.next_soin_id, soin.id);
        let mut stored = soin.clone();
        stored.id = id;
        state.soins.insert(id, stored);
        Ok(id)
    }

    fn get_soin(&self, id: i64) -> StoreResult<Option<Soin>> {
        Ok(self.state()?.soins.get(&id).cloned())
    }

    fn list_soins(&self) -> StoreResult<Vec<Soin>> {
        let mut soins: Vec<Soin> = self.state()?.soins.values().cloned().collect();
        soins.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(soins)
    }

    fn delete_soin(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state()?.soins.remove(&id).is_some())
    }

    fn record_stock_movement(&self, movement: &StockMovement) -> StoreResult<i64> {
        let mut state = self.state()?;
        let product = state
            .products
            .get(&movement.product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", movement.product_id)))?;
        let new_stock = movement.apply_to(product.stock).ok_or_else(|| {
            StoreError::Constraint(format!("Stock cannot go negative for {}", product.name))
        })?;

        if let Some(product) = state.products.get_mut(&movement.product_id) {
            product.stock = new_stock;
        }
        let id = assign_id(&mut state.next_movement_id, 0);
        let mut stored = movement.clone();
        stored.id = id;
        state.movements.push(stored);
        Ok(new_stock)
    }

    fn list_stock_movements(&self, product_id: i64) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .state()?
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}

impl InvoiceStore for MemoryStore {
    fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<i64> {
        let mut state = self.state()?;
        let id = assign_id(&mut state.next_invoice_id, 0);
        let mut stored = invoice.clone();
        stored.id = id;
        state.invoices.insert(id, stored);
        Ok(id)
    }

    fn update_invoice(&self, invoice: &Invoice) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.invoices.get_mut(&invoice.id) {
            Some(existing) => {
                existing.patient_cin = invoice.patient_cin.clone();
                existing.issue_date = invoice.issue_date;
                existing.status = invoice.status;
                existing.notes = invoice.notes.clone();
                existing.replace_items(invoice.items.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_invoice_status(&self, id: i64, status: InvoiceStatus) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.invoices.get_mut(&id) {
            Some(existing) => {
                existing.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_invoice(&self, id: i64) -> StoreResult<Option<Invoice>> {
        Ok(self.state()?.invoices.get(&id).cloned())
    }

    fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.state()?.invoices.values().cloned().collect();
        invoices.sort_by(|a, b| (b.issue_date, b.id).cmp(&(a.issue_date, a.id)));
        Ok(invoices)
    }

    fn delete_invoice(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state()?.invoices.remove(&id).is_some())
    }

    fn count_line_items(&self, invoice_id: i64) -> StoreResult<usize> {
        Ok(self
            .state()?
            .invoices
            .get(&invoice_id)
            .map(|i| i.items.len())
            .unwrap_or(0))
    }
}

impl DocumentStore for MemoryStore {
    fn insert_template(&self, template: &DocumentTemplate) -> StoreResult<i64> {
        let mut state = self.state()?;
        let id = assign_id(&mut state.next_template_id, 0);
        let mut stored = template.clone();
        stored.id = id;
        state.templates.insert(id, stored);
        Ok(id)
    }

    fn update_template(&self, template: &DocumentTemplate) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.templates.get_mut(&template.id) {
            Some(existing) => {
                existing.name = template.name.clone();
                existing.sections = template.sections.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_template(&self, id: i64) -> StoreResult<Option<DocumentTemplate>> {
        Ok(self.state()?.templates.get(&id).cloned())
    }

    fn list_templates(&self) -> StoreResult<Vec<DocumentTemplate>> {
        Ok(self.state()?.templates.values().cloned().collect())
    }

    fn delete_template(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state()?;
        if state.documents.values().any(|d| d.template_id == id) {
            return Err(StoreError::Constraint(format!(
                "Template {} is still used by documents",
                id
            )));
        }
        Ok(state.templates.remove(&id).is_some())
    }

    fn insert_document(&self, document: &Document) -> StoreResult<i64> {
        let mut state = self.state()?;
        if !state.templates.contains_key(&document.template_id) {
            return Err(StoreError::Constraint(format!(
                "Unknown template: {}",
                document.template_id
            )));
        }
        let id = assign_id(&mut state.next_document_id, 0);
        let mut stored = document.clone();
        stored.id = id;
        state.documents.insert(id, stored);
        Ok(id)
    }

    fn update_document_data(&self, id: i64, data: &DocumentData) -> StoreResult<bool> {
        let mut state = self.state()?;
        match state.documents.get_mut(&id) {
            Some(existing) => {
                existing.data = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_document(&self, id: i64) -> StoreResult<Option<Document>> {
        Ok(self.state()?.documents.get(&id).cloned())
    }

    fn list_documents_for_patient(&self, cin: &str) -> StoreResult<Vec<Document>> {
        Ok(self
            .state()?
            .documents
            .values()
            .rev()
            .filter(|d| d.patient_cin == cin)
            .cloned()
            .collect())
    }

    fn delete_document(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state()?.documents.remove(&id).is_some())
    }
}
