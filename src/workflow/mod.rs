//! Receipt ingestion workflow
//!
//! The stages one photo moves through, in pipeline order: normalize the
//! raw extraction payload, persist the resulting drafts, compose the
//! acknowledgment. `ingest` ties them together with the external clients.

pub mod ingest;
pub mod normalize;
pub mod persist;
pub mod respond;

pub use ingest::Pipeline;
pub use normalize::normalize;
pub use persist::{persist, PersistWarnings, PersistedReceipt};
