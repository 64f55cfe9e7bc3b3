//! Invoice models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::{CatalogItem, ItemKind};
use crate::billing::{compute_invoice_totals, AmountOverflow, InvoiceTotals};

/// Invoice status. Any status may be set from any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            "overdue" => Some(InvoiceStatus::Overdue),
            _ => None,
        }
    }
}

/// One billable entry of an invoice.
///
/// Name and unit price are captured when the item is selected, so later
/// catalog edits never alter a historical invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLineItem {
    /// Catalog identifier; `None` (or 0) until an item is picked
    pub item_id: Option<i64>,
    pub kind: ItemKind,
    /// Display name captured at selection time
    pub name: String,
    pub quantity: i64,
    /// Unit price captured at selection time
    pub unit_price: Decimal,
}

impl InvoiceLineItem {
    /// An empty line of the given kind, as a fresh editor row.
    pub fn blank(kind: ItemKind) -> Self {
        Self {
            item_id: None,
            kind,
            name: String::new(),
            quantity: 1,
            unit_price: Decimal::ZERO,
        }
    }

    /// A line already bound to a catalog item.
    pub fn from_catalog(item: &CatalogItem, quantity: i64) -> Self {
        Self {
            item_id: Some(item.id()),
            kind: item.kind(),
            name: item.name().to_string(),
            quantity,
            unit_price: item.unit_price(),
        }
    }

    /// `unit_price * quantity`, unrounded. `None` when out of range.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Whether a catalog item has been picked for this line.
    pub fn has_item(&self) -> bool {
        matches!(self.item_id, Some(id) if id != 0)
    }
}

/// A persisted invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    /// Storage identifier (0 until persisted)
    pub id: i64,
    /// Patient CIN
    pub patient_cin: String,
    pub issue_date: NaiveDate,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    /// Staff member who created the invoice
    pub created_by: String,
    /// Creation timestamp
    pub created_at: String,
    /// Ordered line items
    pub items: Vec<InvoiceLineItem>,
}

impl Invoice {
    /// Build an invoice from submitted form data. The form is assumed valid.
    pub fn from_form(form: &InvoiceForm, issue_date: NaiveDate) -> Self {
        Self {
            id: 0,
            patient_cin: form.patient_cin.trim().to_string(),
            issue_date,
            status: form.status.unwrap_or(InvoiceStatus::Draft),
            notes: form.notes.clone(),
            created_by: form.created_by.trim().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            items: form.items.clone(),
        }
    }

    /// Totals, recomputed from the current line items on every call.
    pub fn totals(&self) -> Result<InvoiceTotals, AmountOverflow> {
        compute_invoice_totals(&self.items)
    }

    /// Replace (never merge) the line items.
    pub fn replace_items(&mut self, items: Vec<InvoiceLineItem>) {
        self.items = items;
    }
}

/// Invoice data as submitted by an editor, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceForm {
    pub patient_cin: String,
    pub issue_date: Option<NaiveDate>,
    pub created_by: String,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceLineItem>,
}

impl InvoiceForm {
    /// Seed an edit form from an existing invoice.
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            patient_cin: invoice.patient_cin.clone(),
            issue_date: Some(invoice.issue_date),
            created_by: invoice.created_by.clone(),
            status: Some(invoice.status),
            notes: invoice.notes.clone(),
            items: invoice.items.clone(),
        }
    }

    /// Totals for the form's current lines.
    pub fn totals(&self) -> Result<InvoiceTotals, AmountOverflow> {
        compute_invoice_totals(&self.items)
    }
}
