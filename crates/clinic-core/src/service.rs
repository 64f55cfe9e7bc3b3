//! Validate-then-persist orchestration over a [`ClinicStore`].
//!
//! Validation always runs before storage is touched. Storage failures are
//! reported once, as a generic [`ClinicError::Storage`], and never retried.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::billing::{validate_invoice, AmountOverflow, CatalogLookup, LookupError};
use crate::db::StoreError;
use crate::models::{
    Document, DocumentData, DocumentTemplate, Invoice, InvoiceForm, InvoiceStatus, Patient,
    StockMovement,
};
use crate::store::ClinicStore;
use crate::templates::{
    migrate_document_data, validate_document_against_template, validate_document_template,
};

/// Service errors.
#[derive(Error, Debug, PartialEq)]
pub enum ClinicError {
    /// User-input problems, in display order
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for ClinicError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ClinicError::NotFound(what),
            other => ClinicError::Storage(other.to_string()),
        }
    }
}

impl From<LookupError> for ClinicError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::InvalidId(id) => {
                ClinicError::Validation(vec![format!("Identifiant d'article invalide : {}", id)])
            }
            LookupError::Store(e) => e.into(),
        }
    }
}

impl From<AmountOverflow> for ClinicError {
    fn from(_: AmountOverflow) -> Self {
        ClinicError::Validation(vec!["Le total de la facture est trop élevé".to_string()])
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;

fn reject(what: &str, errors: Vec<String>) -> ClinicError {
    debug!(count = errors.len(), "{} rejected by validation", what);
    ClinicError::Validation(errors)
}

/// Clinic operations over any storage backend.
pub struct ClinicService<'a, S: ClinicStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ClinicStore + ?Sized> ClinicService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Catalog lookup over the same store.
    pub fn catalog(&self) -> CatalogLookup<'a, S> {
        CatalogLookup::new(self.store)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    pub fn register_patient(&self, patient: &Patient) -> ClinicResult<()> {
        let mut errors = Vec::new();
        if patient.cin.trim().is_empty() {
            errors.push("Le CIN est requis".to_string());
        }
        if patient.first_name.trim().is_empty() {
            errors.push("Le prénom est requis".to_string());
        }
        if patient.last_name.trim().is_empty() {
            errors.push("Le nom est requis".to_string());
        }
        if !errors.is_empty() {
            return Err(reject("patient", errors));
        }

        self.store.insert_patient(patient)?;
        info!(cin = %patient.cin, "patient registered");
        Ok(())
    }

    fn require_patient(&self, cin: &str) -> ClinicResult<Patient> {
        self.store.get_patient(cin)?.ok_or_else(|| {
            warn!(cin = %cin, "unknown patient");
            ClinicError::NotFound(format!("patient {}", cin))
        })
    }

    /// Every picked line item must still exist in the catalog.
    fn require_catalog_items(&self, form: &InvoiceForm) -> ClinicResult<()> {
        let catalog = self.catalog();
        for item in &form.items {
            let Some(id) = item.item_id else { continue };
            if catalog.lookup(item.kind, id)?.is_none() {
                warn!(kind = item.kind.as_str(), id, "unknown catalog item");
                return Err(ClinicError::NotFound(format!("{} {}", item.kind.as_str(), id)));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    pub fn create_invoice(&self, form: &InvoiceForm) -> ClinicResult<Invoice> {
        let errors = validate_invoice(form);
        let Some(issue_date) = form.issue_date.filter(|_| errors.is_empty()) else {
            return Err(reject("invoice", errors));
        };
        self.require_patient(form.patient_cin.trim())?;
        self.require_catalog_items(form)?;

        let mut invoice = Invoice::from_form(form, issue_date);
        let totals = invoice.totals()?;
        invoice.id = self.store.insert_invoice(&invoice)?;

        info!(
            invoice_id = invoice.id,
            items = invoice.items.len(),
            grand_total = %totals.grand_total,
            "invoice created"
        );
        Ok(invoice)
    }

    /// Replace an invoice's header and line items with the form's content.
    pub fn update_invoice(&self, id: i64, form: &InvoiceForm) -> ClinicResult<Invoice> {
        let errors = validate_invoice(form);
        let Some(issue_date) = form.issue_date.filter(|_| errors.is_empty()) else {
            return Err(reject("invoice update", errors));
        };

        let mut invoice = self.get_invoice(id)?;
        self.require_patient(form.patient_cin.trim())?;
        self.require_catalog_items(form)?;

        invoice.patient_cin = form.patient_cin.trim().to_string();
        invoice.issue_date = issue_date;
        if let Some(status) = form.status {
            invoice.status = status;
        }
        invoice.notes = form.notes.clone();
        invoice.replace_items(form.items.clone());

        if !self.store.update_invoice(&invoice)? {
            return Err(ClinicError::NotFound(format!("invoice {}", id)));
        }
        info!(invoice_id = id, items = invoice.items.len(), "invoice updated");
        Ok(invoice)
    }

    /// Set any status from any status.
    pub fn set_invoice_status(&self, id: i64, status: InvoiceStatus) -> ClinicResult<()> {
        if !self.store.set_invoice_status(id, status)? {
            warn!(invoice_id = id, "status change on unknown invoice");
            return Err(ClinicError::NotFound(format!("invoice {}", id)));
        }
        info!(invoice_id = id, status = status.as_str(), "invoice status changed");
        Ok(())
    }

    pub fn get_invoice(&self, id: i64) -> ClinicResult<Invoice> {
        self.store
            .get_invoice(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("invoice {}", id)))
    }

    /// Delete an invoice and its line items.
    pub fn delete_invoice(&self, id: i64) -> ClinicResult<()> {
        if !self.store.delete_invoice(id)? {
            return Err(ClinicError::NotFound(format!("invoice {}", id)));
        }
        info!(invoice_id = id, "invoice deleted");
        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub fn record_stock_movement(&self, movement: &StockMovement) -> ClinicResult<i64> {
        let stock = self.store.record_stock_movement(movement)?;
        info!(
            product_id = movement.product_id,
            delta = movement.delta,
            stock,
            "stock movement recorded"
        );
        Ok(stock)
    }

    // =========================================================================
    // Templates and documents
    // =========================================================================

    pub fn create_template(&self, template: &DocumentTemplate) -> ClinicResult<DocumentTemplate> {
        let errors = validate_document_template(template);
        if !errors.is_empty() {
            return Err(reject("template", errors));
        }

        let mut stored = template.clone();
        stored.id = self.store.insert_template(template)?;
        info!(template_id = stored.id, fields = stored.field_count(), "template created");
        Ok(stored)
    }

    pub fn update_template(&self, template: &DocumentTemplate) -> ClinicResult<()> {
        let errors = validate_document_template(template);
        if !errors.is_empty() {
            return Err(reject("template update", errors));
        }
        if !self.store.update_template(template)? {
            return Err(ClinicError::NotFound(format!("template {}", template.id)));
        }
        info!(template_id = template.id, "template updated");
        Ok(())
    }

    pub fn get_template(&self, id: i64) -> ClinicResult<DocumentTemplate> {
        self.store.get_template(id)?.ok_or_else(|| {
            warn!(template_id = id, "unknown template");
            ClinicError::NotFound(format!("template {}", id))
        })
    }

    /// Create a document bound to `template_id`. Legacy label keys in `data`
    /// are moved to positional keys before storing.
    pub fn create_document(
        &self,
        template_id: i64,
        patient_cin: &str,
        data: &DocumentData,
        created_by: &str,
    ) -> ClinicResult<Document> {
        let template = self.get_template(template_id)?;

        let mut errors = Vec::new();
        if patient_cin.trim().is_empty() {
            errors.push("Le patient est requis".to_string());
        }
        errors.extend(validate_document_against_template(data, &template));
        if !errors.is_empty() {
            return Err(reject("document", errors));
        }
        self.require_patient(patient_cin.trim())?;

        let mut document = Document::new(
            template_id,
            patient_cin.trim().to_string(),
            migrate_document_data(&template, data),
            created_by.to_string(),
        );
        document.id = self.store.insert_document(&document)?;
        info!(document_id = document.id, template_id, "document created");
        Ok(document)
    }

    /// Replace a document's data. Its template cannot change.
    pub fn update_document(&self, id: i64, data: &DocumentData) -> ClinicResult<Document> {
        let mut document = self
            .store
            .get_document(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("document {}", id)))?;
        let template = self.get_template(document.template_id)?;

        let errors = validate_document_against_template(data, &template);
        if !errors.is_empty() {
            return Err(reject("document update", errors));
        }

        document.data = migrate_document_data(&template, data);
        if !self.store.update_document_data(id, &document.data)? {
            return Err(ClinicError::NotFound(format!("document {}", id)));
        }
        info!(document_id = id, "document updated");
        Ok(document)
    }

    pub fn delete_document(&self, id: i64) -> ClinicResult<()> {
        if !self.store.delete_document(id)? {
            return Err(ClinicError::NotFound(format!("document {}", id)));
        }
        info!(document_id = id, "document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, InvoiceLineItem, ItemKind, Product, TemplateField, TemplateSection};
    use crate::store::{CatalogStore, InvoiceStore, MemoryStore, PatientStore};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn setup_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_patient(&Patient::new("AB1".into(), "Salma".into(), "Idrissi".into()))
            .unwrap();
        store
            .upsert_product(&Product::new("Omega 3".into(), Decimal::new(100, 0)))
            .unwrap();
        store
    }

    fn form() -> InvoiceForm {
        InvoiceForm {
            patient_cin: "AB1".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            created_by: "reception".into(),
            status: None,
            notes: None,
            items: vec![InvoiceLineItem {
                item_id: Some(1),
                kind: ItemKind::Product,
                name: "Omega 3".into(),
                quantity: 2,
                unit_price: Decimal::new(100, 0),
            }],
        }
    }

    #[test]
    fn test_invalid_invoice_never_persisted() {
        let store = setup_store();
        let service = ClinicService::new(&store);

        let mut bad = form();
        bad.items.clear();
        let err = service.create_invoice(&bad).unwrap_err();
        assert_eq!(
            err,
            ClinicError::Validation(vec!["Au moins un article est requis".into()])
        );
        assert!(store.list_invoices().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_patient() {
        let store = setup_store();
        let service = ClinicService::new(&store);

        let mut f = form();
        f.patient_cin = "ZZ9".into();
        assert!(matches!(
            service.create_invoice(&f),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_catalog_item() {
        let store = setup_store();
        let service = ClinicService::new(&store);

        let mut f = form();
        f.items[0].item_id = Some(42);
        assert_eq!(
            service.create_invoice(&f),
            Err(ClinicError::NotFound("product 42".into()))
        );
        assert!(store.list_invoices().unwrap().is_empty());

        let invoice = service.create_invoice(&form()).unwrap();
        let mut edit = InvoiceForm::from_invoice(&invoice);
        edit.items[0].kind = ItemKind::Service;
        assert_eq!(
            service.update_invoice(invoice.id, &edit),
            Err(ClinicError::NotFound("service 1".into()))
        );
        assert_eq!(service.get_invoice(invoice.id).unwrap().items, invoice.items);
    }

    #[test]
    fn test_create_update_delete_invoice() {
        let store = setup_store();
        let service = ClinicService::new(&store);

        let invoice = service.create_invoice(&form()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.totals().unwrap().grand_total, Decimal::new(240, 0));

        let mut edit = InvoiceForm::from_invoice(&invoice);
        edit.items[0].quantity = 1;
        edit.status = Some(InvoiceStatus::Sent);
        let updated = service.update_invoice(invoice.id, &edit).unwrap();
        assert_eq!(updated.totals().unwrap().grand_total, Decimal::new(120, 0));
        assert_eq!(updated.status, InvoiceStatus::Sent);

        service.delete_invoice(invoice.id).unwrap();
        assert_eq!(store.count_line_items(invoice.id).unwrap(), 0);
        assert!(matches!(
            service.delete_invoice(invoice.id),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_status_any_to_any() {
        let store = setup_store();
        let service = ClinicService::new(&store);
        let invoice = service.create_invoice(&form()).unwrap();

        service.set_invoice_status(invoice.id, InvoiceStatus::Paid).unwrap();
        service.set_invoice_status(invoice.id, InvoiceStatus::Draft).unwrap();
        assert_eq!(
            service.get_invoice(invoice.id).unwrap().status,
            InvoiceStatus::Draft
        );
    }

    #[test]
    fn test_document_lifecycle_with_migration() {
        let store = setup_store();
        let service = ClinicService::new(&store);

        let template = service
            .create_template(&DocumentTemplate::new(
                "Consultation".into(),
                "dr".into(),
                vec![TemplateSection {
                    title: "Général".into(),
                    fields: vec![TemplateField::new("Motif", FieldType::Text, true)],
                }],
            ))
            .unwrap();

        let err = service
            .create_document(template.id, "AB1", &DocumentData::new(), "dr")
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(ref e) if e.len() == 1));

        let mut legacy = DocumentData::new();
        legacy.insert("Motif".into(), json!("Fatigue"));
        let doc = service
            .create_document(template.id, "AB1", &legacy, "dr")
            .unwrap();
        let key = crate::templates::compute_field_key(template.id, 0, 0);
        assert_eq!(doc.data.get(&key), Some(&json!("Fatigue")));
        assert!(!doc.data.contains_key("Motif"));

        let mut data = DocumentData::new();
        data.insert(key.clone(), json!(""));
        assert!(service.update_document(doc.id, &data).is_err());
    }

    #[test]
    fn test_document_unknown_template() {
        let store = setup_store();
        let service = ClinicService::new(&store);
        assert!(matches!(
            service.create_document(5, "AB1", &DocumentData::new(), "dr"),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_template_rejected() {
        let store = setup_store();
        let service = ClinicService::new(&store);
        let template = DocumentTemplate::new("Vide".into(), "dr".into(), vec![]);
        assert!(matches!(
            service.create_template(&template),
            Err(ClinicError::Validation(_))
        ));
    }
}
