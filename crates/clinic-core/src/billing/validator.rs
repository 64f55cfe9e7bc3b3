//! Invoice form validation.

use rust_decimal::Decimal;

use super::compute_invoice_totals;
use crate::models::InvoiceForm;

/// Validate invoice form data.
///
/// Returns human-readable messages in a fixed order: patient, issue date,
/// creator, then line items in list order. An empty list means valid.
/// Service lines are not pinned to quantity 1 here.
pub fn validate_invoice(form: &InvoiceForm) -> Vec<String> {
    let mut errors = Vec::new();

    if form.patient_cin.trim().is_empty() {
        errors.push("Le patient est requis".to_string());
    }

    if form.issue_date.is_none() {
        errors.push("La date de facturation est requise".to_string());
    }

    if form.created_by.trim().is_empty() {
        errors.push("Le créateur de la facture est requis".to_string());
    }

    if form.items.is_empty() {
        errors.push("Au moins un article est requis".to_string());
    }

    for (index, item) in form.items.iter().enumerate() {
        let n = index + 1;
        if !item.has_item() {
            errors.push(format!("Article {} : veuillez sélectionner un produit ou un soin", n));
        }
        if item.quantity <= 0 {
            errors.push(format!("Article {} : la quantité doit être supérieure à 0", n));
        }
        if item.unit_price <= Decimal::ZERO {
            errors.push(format!("Article {} : le prix unitaire doit être supérieur à 0", n));
        }
        if item.line_total().is_none() {
            errors.push(format!("Article {} : le montant de la ligne est trop élevé", n));
        }
    }

    if errors.is_empty() && compute_invoice_totals(&form.items).is_err() {
        errors.push("Le total de la facture est trop élevé".to_string());
    }

    errors
}
