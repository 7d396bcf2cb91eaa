//! Domain model types

pub mod categories;
pub mod extraction;
pub mod receipt;

pub use categories::{ExpenseCategory, ItemCategory};
pub use extraction::{RawItem, RawReceipt, SCHEMA_VERSION};
pub use receipt::{IngestJob, IngestState, NormalizedItem, NormalizedReceipt};
