//! Persistence coordinator scenarios over a scripted store.

use async_trait::async_trait;
use chrono::NaiveDate;
use raccoon_bot::db::{ingest_key, NewReceipt, ReceiptStore, StoreError, UserIdentity, UserRow};
use raccoon_bot::models::{ExpenseCategory, ItemCategory, NormalizedItem, NormalizedReceipt};
use raccoon_bot::workflow::persist;
use std::sync::Mutex;

/// Store double that records call order and fails on demand per step.
#[derive(Default)]
struct ScriptedStore {
    fail_user: bool,
    fail_receipt: bool,
    fail_items: bool,
    template: Option<String>,
    calls: Mutex<Vec<&'static str>>,
    receipts: Mutex<Vec<NewReceipt>>,
    item_batches: Mutex<Vec<(i64, Vec<NormalizedItem>)>>,
}

#[async_trait]
impl ReceiptStore for ScriptedStore {
    async fn upsert_user(&self, identity: &UserIdentity) -> Result<UserRow, StoreError> {
        self.calls.lock().unwrap().push("upsert_user");
        if self.fail_user {
            return Err(StoreError::NetworkError("store down".to_string()));
        }
        Ok(UserRow {
            discord_id: identity.discord_id.clone(),
            display_name: Some(identity.display_name.clone()),
            handle: Some(identity.handle.clone()),
            avatar_url: identity.avatar_url.clone(),
            // Pre-set budget, as the dashboard would have written it.
            category_budgets: Some(serde_json::json!({"Groceries": 400})),
            bot_response_template: self.template.clone(),
        })
    }

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<i64, StoreError> {
        self.calls.lock().unwrap().push("insert_receipt");
        if self.fail_receipt {
            return Err(StoreError::MissingRepresentation);
        }
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(42)
    }

    async fn insert_line_items(
        &self,
        receipt_id: i64,
        items: &[NormalizedItem],
    ) -> Result<usize, StoreError> {
        self.calls.lock().unwrap().push("insert_line_items");
        if self.fail_items {
            return Err(StoreError::ApiError(500, "oops".to_string()));
        }
        self.item_batches
            .lock()
            .unwrap()
            .push((receipt_id, items.to_vec()));
        Ok(items.len())
    }

    async fn write_heartbeat(&self, _: &str) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push("write_heartbeat");
        Ok(())
    }
}

fn identity() -> UserIdentity {
    UserIdentity {
        discord_id: "123".to_string(),
        display_name: "Casey R".to_string(),
        handle: "casey".to_string(),
        avatar_url: None,
    }
}

fn grocery_receipt() -> NormalizedReceipt {
    NormalizedReceipt {
        store_name: Some("Aldi".to_string()),
        store_address: None,
        purchase_date: NaiveDate::from_ymd_opt(2025, 3, 14),
        total_amount: 12.48,
        category: ExpenseCategory::Groceries,
        items: vec![
            NormalizedItem {
                name: "Milk".to_string(),
                total_price: 3.49,
                quantity: 1.0,
                category: ItemCategory::DairyEggs,
            },
            NormalizedItem {
                name: "Bread".to_string(),
                total_price: 2.99,
                quantity: 1.0,
                category: ItemCategory::GrainsStaples,
            },
        ],
    }
}

#[tokio::test]
async fn writes_follow_dependency_order() {
    let store = ScriptedStore::default();
    let receipt = grocery_receipt();

    let persisted = persist(&store, &identity(), &receipt, "https://cdn/x.jpg", "x.jpg")
        .await
        .unwrap();

    assert_eq!(
        *store.calls.lock().unwrap(),
        vec!["upsert_user", "insert_receipt", "insert_line_items"]
    );
    assert_eq!(persisted.receipt_id, 42);
    assert_eq!(persisted.items_written, 2);
    assert_eq!(persisted.warnings, Default::default());

    let batches = store.item_batches.lock().unwrap();
    assert_eq!(batches[0].0, 42);
    assert_eq!(batches[0].1.len(), 2);
}

#[tokio::test]
async fn empty_draft_list_never_reaches_the_store() {
    let store = ScriptedStore::default();
    let mut receipt = grocery_receipt();
    receipt.items.clear();

    let persisted = persist(&store, &identity(), &receipt, "https://cdn/x.jpg", "x.jpg")
        .await
        .unwrap();

    assert_eq!(persisted.items_written, 0);
    assert_eq!(
        *store.calls.lock().unwrap(),
        vec!["upsert_user", "insert_receipt"]
    );
}

#[tokio::test]
async fn user_upsert_failure_is_absorbed() {
    let store = ScriptedStore {
        fail_user: true,
        ..Default::default()
    };

    let persisted = persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/x.jpg",
        "x.jpg",
    )
    .await
    .unwrap();

    assert!(persisted.warnings.user_upsert);
    assert!(persisted.user.is_none());
    // The receipt still lands.
    assert_eq!(store.receipts.lock().unwrap().len(), 1);
    assert_eq!(persisted.items_written, 2);
}

#[tokio::test]
async fn receipt_failure_ends_the_pass_before_items() {
    let store = ScriptedStore {
        fail_receipt: true,
        ..Default::default()
    };

    let err = persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/x.jpg",
        "x.jpg",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StoreError::MissingRepresentation));
    let calls = store.calls.lock().unwrap();
    assert!(!calls.contains(&"insert_line_items"));
}

#[tokio::test]
async fn item_failure_keeps_the_receipt() {
    let store = ScriptedStore {
        fail_items: true,
        ..Default::default()
    };

    let persisted = persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/x.jpg",
        "x.jpg",
    )
    .await
    .unwrap();

    assert!(persisted.warnings.item_insert);
    assert_eq!(persisted.items_written, 0);
    assert_eq!(store.receipts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_payload_cannot_touch_the_budget() {
    let store = ScriptedStore::default();

    let persisted = persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/x.jpg",
        "x.jpg",
    )
    .await
    .unwrap();

    // The payload type carries identity fields only.
    let payload = serde_json::to_value(identity()).unwrap();
    let keys = payload.as_object().unwrap();
    assert!(!keys.contains_key("category_budgets"));
    assert!(!keys.contains_key("bot_response_template"));

    // And the pre-set budget rides back on the merged row untouched.
    let user = persisted.user.unwrap();
    assert_eq!(
        user.category_budgets,
        Some(serde_json::json!({"Groceries": 400}))
    );
}

#[tokio::test]
async fn response_template_rides_back_on_the_merged_row() {
    let store = ScriptedStore {
        template: Some("Thanks, {store}!".to_string()),
        ..Default::default()
    };

    let persisted = persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/x.jpg",
        "x.jpg",
    )
    .await
    .unwrap();

    let user = persisted.user.unwrap();
    assert_eq!(user.bot_response_template.as_deref(), Some("Thanks, {store}!"));
}

#[tokio::test]
async fn receipt_row_carries_the_reconciliation_fields() {
    let store = ScriptedStore::default();

    persist(
        &store,
        &identity(),
        &grocery_receipt(),
        "https://cdn/photos/abc.jpg",
        "abc.jpg",
    )
    .await
    .unwrap();

    let receipts = store.receipts.lock().unwrap();
    let row = &receipts[0];
    assert_eq!(row.image_url, "https://cdn/photos/abc.jpg");
    assert_eq!(row.ingest_key, ingest_key("abc.jpg"));
    assert_eq!(row.items_draft.as_array().unwrap().len(), 2);
}
