//! Persistence coordinator
//!
//! Writes one receipt's rows in dependency order: user, then header, then
//! items. Only the header write can fail the run. The store exposes no
//! cross-row transaction, so a receipt whose item batch was lost stays in
//! place; its stored draft lets a reconciliation pass re-drive the batch
//! without another extraction.

use crate::db::{ingest_key, NewReceipt, ReceiptStore, StoreError, UserIdentity, UserRow};
use crate::models::NormalizedReceipt;
use tracing::warn;

/// Non-fatal conditions absorbed during a persist pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistWarnings {
    pub user_upsert: bool,
    pub item_insert: bool,
}

/// What a successful persist pass produced.
#[derive(Debug)]
pub struct PersistedReceipt {
    pub receipt_id: i64,
    pub items_written: usize,
    /// Merged user row when the upsert succeeded; carries the sender's
    /// response template for the composer.
    pub user: Option<UserRow>,
    pub warnings: PersistWarnings,
}

/// Write one normalized receipt to the store.
pub async fn persist(
    store: &dyn ReceiptStore,
    identity: &UserIdentity,
    receipt: &NormalizedReceipt,
    image_url: &str,
    asset_path: &str,
) -> Result<PersistedReceipt, StoreError> {
    let mut warnings = PersistWarnings::default();

    // Losing the identity refresh costs a stale display name, not a
    // receipt, so the run continues without it.
    let user = match store.upsert_user(identity).await {
        Ok(row) => Some(row),
        Err(e) => {
            warn!(discord_id = %identity.discord_id, error = %e, "User upsert failed, continuing");
            warnings.user_upsert = true;
            None
        }
    };

    // Without a header id the items have nothing to reference.
    let row = NewReceipt::from_normalized(
        identity.discord_id.clone(),
        receipt,
        image_url,
        ingest_key(asset_path),
    );
    let receipt_id = store.insert_receipt(&row).await?;

    // Itemless receipts produce no batch call at all. A failed batch
    // leaves the header as written.
    let mut items_written = 0;
    if !receipt.items.is_empty() {
        match store.insert_line_items(receipt_id, &receipt.items).await {
            Ok(count) => items_written = count,
            Err(e) => {
                warn!(receipt_id, error = %e, "Line item insert failed, receipt kept");
                warnings.item_insert = true;
            }
        }
    }

    Ok(PersistedReceipt {
        receipt_id,
        items_written,
        user,
        warnings,
    })
}
