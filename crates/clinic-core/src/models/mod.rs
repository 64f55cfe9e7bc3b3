//! Domain models for the clinic core.

mod catalog;
mod document;
mod invoice;
mod patient;
mod stock;

pub use catalog::*;
pub use document::*;
pub use invoice::*;
pub use patient::*;
pub use stock::*;
