//! Line item rows
//!
//! Items land as one batch insert right after their receipt header. An
//! empty draft list produces no request at all.

use super::client::{StoreClient, StoreError};
use crate::models::{ItemCategory, NormalizedItem};
use serde::Serialize;

const TABLE: &str = "receipt_items";

/// Insert payload for one line item. The store's price column predates
/// the total/unit split, hence `price`.
#[derive(Debug, Clone, Serialize)]
pub struct NewLineItem {
    pub receipt_id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: f64,
    pub category: ItemCategory,
}

impl NewLineItem {
    pub fn from_normalized(receipt_id: i64, item: &NormalizedItem) -> Self {
        Self {
            receipt_id,
            name: item.name.clone(),
            price: item.total_price,
            quantity: item.quantity,
            category: item.category,
        }
    }
}

/// Batch-insert the items for a receipt, returning how many were written.
/// Empty batches are skipped without touching the store.
pub async fn insert_line_items(
    client: &StoreClient,
    receipt_id: i64,
    items: &[NormalizedItem],
) -> Result<usize, StoreError> {
    if items.is_empty() {
        return Ok(0);
    }

    let rows: Vec<NewLineItem> = items
        .iter()
        .map(|item| NewLineItem::from_normalized(receipt_id, item))
        .collect();

    let response = client
        .post(client.table_url(TABLE), None)
        .json(&rows)
        .send()
        .await
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    StoreClient::check(response).await?;

    tracing::debug!(receipt_id = receipt_id, items = rows.len(), "Line items inserted");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_the_price_column() {
        let item = NormalizedItem {
            name: "Unleaded".to_string(),
            total_price: 35.0,
            quantity: 10.0,
            category: ItemCategory::Misc,
        };
        let row = NewLineItem::from_normalized(7, &item);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["receipt_id"], 7);
        assert_eq!(value["price"], 35.0);
        assert_eq!(value["quantity"], 10.0);
        assert_eq!(value["category"], "Misc");
        assert!(value.get("total_price").is_none());
    }
}
