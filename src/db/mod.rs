//! Data store access
//!
//! Free functions per table, all taking the shared `StoreClient`, plus
//! the `ReceiptStore` trait the pipeline and schedulers depend on.

pub mod client;
pub mod heartbeat;
pub mod line_items;
pub mod receipts;
pub mod users;

pub use client::{StoreClient, StoreError};
pub use heartbeat::HeartbeatRecord;
pub use line_items::NewLineItem;
pub use receipts::{ingest_key, NewReceipt};
pub use users::{UserIdentity, UserRow};

use crate::models::NormalizedItem;
use async_trait::async_trait;

/// Everything the rest of the process is allowed to do to the store.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Insert-or-refresh a user's identity fields, returning the merged row.
    async fn upsert_user(&self, identity: &UserIdentity) -> Result<UserRow, StoreError>;

    /// Insert a receipt header, returning the store-assigned id.
    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<i64, StoreError>;

    /// Batch-insert line items for an existing receipt.
    async fn insert_line_items(
        &self,
        receipt_id: i64,
        items: &[NormalizedItem],
    ) -> Result<usize, StoreError>;

    /// Overwrite the service's liveness timestamp.
    async fn write_heartbeat(&self, service_name: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl ReceiptStore for StoreClient {
    async fn upsert_user(&self, identity: &UserIdentity) -> Result<UserRow, StoreError> {
        users::upsert_user(self, identity).await
    }

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<i64, StoreError> {
        receipts::insert_receipt(self, receipt).await
    }

    async fn insert_line_items(
        &self,
        receipt_id: i64,
        items: &[NormalizedItem],
    ) -> Result<usize, StoreError> {
        line_items::insert_line_items(self, receipt_id, items).await
    }

    async fn write_heartbeat(&self, service_name: &str) -> Result<(), StoreError> {
        heartbeat::write_heartbeat(self, service_name).await
    }
}
