//! Receipt rows
//!
//! One insert per successfully extracted photo. The row carries an ingest
//! key (hash of the asset path) and the normalized item drafts so a later
//! reconciliation pass can detect and re-drive partial writes without
//! re-running extraction.

use super::client::{StoreClient, StoreError, PREFER_REPRESENTATION};
use crate::models::{ExpenseCategory, NormalizedReceipt};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const TABLE: &str = "receipts";

/// Insert payload for one receipt header.
#[derive(Debug, Clone, Serialize)]
pub struct NewReceipt {
    pub discord_user_id: String,
    pub store_name: String,
    pub store_address: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub receipt_type: ExpenseCategory,
    /// Public URL of the stored photo.
    pub image_url: String,
    pub ingest_key: String,
    pub items_draft: serde_json::Value,
}

impl NewReceipt {
    pub fn from_normalized(
        user_id: impl Into<String>,
        receipt: &NormalizedReceipt,
        image_url: impl Into<String>,
        ingest_key: impl Into<String>,
    ) -> Self {
        Self {
            discord_user_id: user_id.into(),
            store_name: receipt.store_label().to_string(),
            store_address: receipt.store_address.clone(),
            purchase_date: receipt.purchase_date,
            total_amount: receipt.total_amount,
            receipt_type: receipt.category,
            image_url: image_url.into(),
            ingest_key: ingest_key.into(),
            items_draft: serde_json::to_value(&receipt.items).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReceiptRow {
    id: i64,
}

/// Idempotency key for a receipt: hex digest of its asset path.
pub fn ingest_key(asset_path: &str) -> String {
    format!("{:x}", Sha256::digest(asset_path.as_bytes()))
}

/// Insert the receipt header, returning the store-assigned id. A write
/// that echoes no id fails the run; line items would have nothing to
/// reference.
pub async fn insert_receipt(
    client: &StoreClient,
    receipt: &NewReceipt,
) -> Result<i64, StoreError> {
    let response = client
        .post(client.table_url(TABLE), Some(PREFER_REPRESENTATION))
        .json(&[receipt])
        .send()
        .await
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    let rows: Vec<ReceiptRow> = StoreClient::check(response)
        .await?
        .json()
        .await
        .map_err(|e| StoreError::ParseError(e.to_string()))?;

    rows.into_iter()
        .next()
        .map(|r| r.id)
        .ok_or(StoreError::MissingRepresentation)
}
