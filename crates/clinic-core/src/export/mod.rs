//! Invoice export for accounting.

mod billing;

pub use billing::*;
