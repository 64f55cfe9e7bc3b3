//! Dynamic document rules.
//!
//! - [`keys`]: positional storage keys with legacy name fallback
//! - [`editor`]: field type to input control mapping
//! - [`validation`]: template and document checks

mod editor;
mod keys;
mod validation;

pub use editor::*;
pub use keys::*;
pub use validation::*;
