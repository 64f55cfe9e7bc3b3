//! Invoice totals.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::InvoiceLineItem;

/// TVA rate in percent. Not configurable.
pub const TAX_RATE_PERCENT: u32 = 20;

/// Derived invoice amounts. Never stored; always recomputed from line items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceTotals {
    /// Sum of line totals, unrounded
    pub pretax_total: Decimal,
    /// `round(pretax_total * tax_rate / 100, 2)`
    pub tax_amount: Decimal,
    /// Tax rate in percent
    pub tax_rate: Decimal,
    /// `round(pretax_total + tax_amount, 2)`
    pub grand_total: Decimal,
}

/// An amount exceeded the range of `Decimal`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invoice amount out of range")]
pub struct AmountOverflow;

/// Round half-up to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute totals for an ordered list of line items.
///
/// Rounding happens in two steps: tax is rounded first, then added to the
/// unrounded pretax total and the sum rounded again. This is not the same as
/// `round(pretax * 1.20, 2)` for some fractional inputs.
pub fn compute_invoice_totals(items: &[InvoiceLineItem]) -> Result<InvoiceTotals, AmountOverflow> {
    let pretax_total = items.iter().try_fold(Decimal::ZERO, |sum, item| {
        item.line_total().and_then(|total| sum.checked_add(total))
    });
    let pretax_total = pretax_total.ok_or(AmountOverflow)?;
    let tax_rate = Decimal::from(TAX_RATE_PERCENT);
    let tax_amount = pretax_total
        .checked_mul(tax_rate)
        .and_then(|amount| amount.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or(AmountOverflow)?;
    let grand_total = pretax_total
        .checked_add(tax_amount)
        .map(round_money)
        .ok_or(AmountOverflow)?;

    Ok(InvoiceTotals {
        pretax_total,
        tax_amount,
        tax_rate,
        grand_total,
    })
}
