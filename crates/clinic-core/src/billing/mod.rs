//! Billing rules: catalog lookup, invoice totals and invoice validation.

mod aggregator;
mod lookup;
mod validator;

pub use aggregator::*;
pub use lookup::*;
pub use validator::*;
