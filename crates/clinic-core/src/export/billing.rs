//! Invoice export to JSON and CSV.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::billing::{AmountOverflow, InvoiceTotals};
use crate::db::StoreError;
use crate::models::{Invoice, InvoiceStatus};
use crate::store::InvoiceStore;

const CSV_HEADER: &str = "invoice_id,patient_cin,issue_date,status,kind,item_id,name,quantity,unit_price,line_total,pretax_total,tax_amount,grand_total\n";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Amount(#[from] AmountOverflow),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Export of a single invoice with its computed totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExport {
    pub metadata: InvoiceExportMetadata,
    pub line_items: Vec<InvoiceExportLine>,
    pub totals: InvoiceTotals,
}

/// Invoice header fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExportMetadata {
    pub invoice_id: i64,
    pub patient_cin: String,
    /// `YYYY-MM-DD`
    pub issue_date: String,
    pub status: InvoiceStatus,
    pub created_by: String,
    pub exported_at: String,
}

/// One exported line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExportLine {
    pub kind: String,
    pub item_id: Option<i64>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl InvoiceExport {
    pub fn from_invoice(invoice: &Invoice) -> Result<Self, AmountOverflow> {
        let line_items = invoice
            .items
            .iter()
            .map(|item| {
                Ok(InvoiceExportLine {
                    kind: item.kind.as_str().to_string(),
                    item_id: item.item_id,
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total().ok_or(AmountOverflow)?,
                })
            })
            .collect::<Result<_, AmountOverflow>>()?;

        Ok(Self {
            metadata: InvoiceExportMetadata {
                invoice_id: invoice.id,
                patient_cin: invoice.patient_cin.clone(),
                issue_date: invoice.issue_date.format("%Y-%m-%d").to_string(),
                status: invoice.status,
                created_by: invoice.created_by.clone(),
                exported_at: chrono::Utc::now().to_rfc3339(),
            },
            line_items,
            totals: invoice.totals()?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// CSV with one row per line item. Invoice totals repeat on each row.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        self.write_rows(&mut csv);
        csv
    }

    fn write_rows(&self, csv: &mut String) {
        let meta = &self.metadata;
        for item in &self.line_items {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                meta.invoice_id,
                escape_csv(&meta.patient_cin),
                meta.issue_date,
                meta.status.as_str(),
                item.kind,
                item.item_id.map(|id| id.to_string()).unwrap_or_default(),
                escape_csv(&item.name),
                item.quantity,
                item.unit_price,
                item.line_total,
                self.totals.pretax_total,
                self.totals.tax_amount,
                self.totals.grand_total,
            ));
        }
    }
}

/// Several invoices exported together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInvoiceExport {
    pub exported_at: String,
    pub invoices: Vec<InvoiceExport>,
    /// Line items across all invoices
    pub total_items: usize,
    /// Sum of each invoice's grand total
    pub grand_total: Decimal,
}

impl BatchInvoiceExport {
    pub fn from_invoices(invoices: &[Invoice]) -> Result<Self, AmountOverflow> {
        let invoices = invoices
            .iter()
            .map(InvoiceExport::from_invoice)
            .collect::<Result<Vec<_>, _>>()?;
        let grand_total = invoices
            .iter()
            .try_fold(Decimal::ZERO, |sum, e| sum.checked_add(e.totals.grand_total))
            .ok_or(AmountOverflow)?;
        Ok(Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            total_items: invoices.iter().map(|e| e.line_items.len()).sum(),
            grand_total,
            invoices,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        for export in &self.invoices {
            export.write_rows(&mut csv);
        }
        csv
    }
}

/// Reads invoices from a store and builds exports.
pub struct InvoiceExporter<'a, S: InvoiceStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: InvoiceStore + ?Sized> InvoiceExporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn export_by_id(&self, id: i64) -> ExportResult<InvoiceExport> {
        let invoice = self
            .store
            .get_invoice(id)?
            .ok_or_else(|| StoreError::NotFound(format!("invoice {}", id)))?;
        Ok(InvoiceExport::from_invoice(&invoice)?)
    }

    pub fn export_all(&self) -> ExportResult<BatchInvoiceExport> {
        Ok(BatchInvoiceExport::from_invoices(&self.store.list_invoices()?)?)
    }

    pub fn export_by_status(&self, status: InvoiceStatus) -> ExportResult<BatchInvoiceExport> {
        Ok(BatchInvoiceExport::from_invoices(
            &self.store.list_invoices_by_status(status)?,
        )?)
    }

    pub fn export_for_patient(&self, cin: &str) -> ExportResult<BatchInvoiceExport> {
        Ok(BatchInvoiceExport::from_invoices(
            &self.store.list_invoices_for_patient(cin)?,
        )?)
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceLineItem, ItemKind};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn make_invoice(cin: &str) -> Invoice {
        Invoice {
            id: 0,
            patient_cin: cin.into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            status: InvoiceStatus::Sent,
            notes: None,
            created_by: "reception".into(),
            created_at: "2024-03-15T09:00:00Z".into(),
            items: vec![
                InvoiceLineItem {
                    item_id: Some(1),
                    kind: ItemKind::Product,
                    name: "Crème hydratante, 50ml".into(),
                    quantity: 2,
                    unit_price: Decimal::new(10000, 2),
                },
                InvoiceLineItem {
                    item_id: Some(3),
                    kind: ItemKind::Service,
                    name: "Séance".into(),
                    quantity: 1,
                    unit_price: Decimal::new(4999, 2),
                },
            ],
        }
    }

    #[test]
    fn test_export_carries_totals() {
        let export = InvoiceExport::from_invoice(&make_invoice("AB1")).unwrap();
        assert_eq!(export.line_items.len(), 2);
        assert_eq!(export.line_items[0].line_total, Decimal::new(20000, 2));
        assert_eq!(export.totals.pretax_total, Decimal::new(24999, 2));
        assert_eq!(export.totals.tax_amount, Decimal::new(5000, 2));
        assert_eq!(export.totals.grand_total, Decimal::new(29999, 2));
        assert_eq!(export.metadata.issue_date, "2024-03-15");
    }

    #[test]
    fn test_export_json() {
        let json = InvoiceExport::from_invoice(&make_invoice("AB1")).unwrap().to_json().unwrap();
        assert!(json.contains("\"patient_cin\": \"AB1\""));
        assert!(json.contains("299.99"));
    }

    #[test]
    fn test_export_csv() {
        let csv = InvoiceExport::from_invoice(&make_invoice("AB1")).unwrap().to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3); // Header + 2 items
        assert!(lines[0].starts_with("invoice_id"));
        assert!(lines[1].contains("\"Crème hydratante, 50ml\""));
        assert!(lines[2].ends_with("249.99,50.00,299.99"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_batch_export() {
        let store = MemoryStore::new();
        store.insert_invoice(&make_invoice("AB1")).unwrap();
        let mut other = make_invoice("CD2");
        other.status = InvoiceStatus::Paid;
        store.insert_invoice(&other).unwrap();

        let exporter = InvoiceExporter::new(&store);
        let batch = exporter.export_all().unwrap();
        assert_eq!(batch.invoices.len(), 2);
        assert_eq!(batch.total_items, 4);
        assert_eq!(batch.grand_total, Decimal::new(59998, 2));
        assert_eq!(batch.to_csv().lines().count(), 5);

        assert_eq!(exporter.export_by_status(InvoiceStatus::Paid).unwrap().invoices.len(), 1);
        assert_eq!(exporter.export_for_patient("AB1").unwrap().invoices.len(), 1);
        assert!(matches!(
            exporter.export_by_id(99),
            Err(ExportError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_out_of_range_invoice_not_exported() {
        let mut invoice = make_invoice("AB1");
        invoice.items[0].quantity = i64::MAX;
        invoice.items[0].unit_price = Decimal::new(100_000_000_000, 0);
        assert_eq!(InvoiceExport::from_invoice(&invoice).unwrap_err(), AmountOverflow);

        let store = MemoryStore::new();
        store.insert_invoice(&invoice).unwrap();
        assert!(matches!(
            InvoiceExporter::new(&store).export_all(),
            Err(ExportError::Amount(AmountOverflow))
        ));
    }
}
