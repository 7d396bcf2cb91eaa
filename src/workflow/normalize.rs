//! Domain normalizer
//!
//! Repairs a raw extraction payload into drafts ready for the store.
//! Pure and deterministic: the same payload always yields identical
//! drafts, so persistence can be re-driven without another extraction.
//!
//! The contract version gates behavior that did not exist in revision 1.
//! Today that is only the fuel quantity derivation; revision 1 payloads
//! never carried a unit price, so an unexpected one there is ignored.

use crate::models::extraction::{RawItem, RawReceipt, SCHEMA_VERSION};
use crate::models::{ExpenseCategory, ItemCategory, NormalizedItem, NormalizedReceipt};
use chrono::NaiveDate;

/// Repair one raw payload into a normalized receipt draft.
pub fn normalize(raw: &RawReceipt) -> NormalizedReceipt {
    let version = raw.schema_version.unwrap_or(SCHEMA_VERSION);

    NormalizedReceipt {
        store_name: trim_to_none(&raw.store_name),
        store_address: trim_to_none(&raw.store_address),
        purchase_date: parse_date(&raw.purchase_date),
        total_amount: clean_money(raw.total_amount),
        category: ExpenseCategory::coerce(raw.receipt_type.as_deref()),
        items: raw
            .items
            .iter()
            .map(|item| normalize_item(item, version))
            .collect(),
    }
}

fn normalize_item(item: &RawItem, version: u32) -> NormalizedItem {
    let total_price = clean_money(item.total_price);

    NormalizedItem {
        name: trim_to_none(&item.name).unwrap_or_else(|| "Unknown".to_string()),
        total_price,
        quantity: clean_quantity(item, total_price, version),
        category: ItemCategory::coerce(item.category.as_deref()),
    }
}

/// Quantity rules, in order: keep a valid printed quantity; derive from
/// unit price when the contract supports it (quantity = total / unit);
/// otherwise 1.
fn clean_quantity(item: &RawItem, total_price: f64, version: u32) -> f64 {
    if let Some(quantity) = item.quantity {
        if quantity.is_finite() && quantity > 0.0 {
            return quantity;
        }
    }

    if version >= 2 {
        if let Some(unit_price) = item.price_per_unit {
            if unit_price.is_finite() && unit_price > 0.0 && total_price > 0.0 {
                let derived = total_price / unit_price;
                if derived.is_finite() && derived > 0.0 {
                    return derived;
                }
            }
        }
    }

    1.0
}

/// Non-negative finite amount; everything else is 0.
fn clean_money(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn trim_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strict ISO calendar date; anything else stays null rather than being
/// guessed at.
fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_item(json: &str) -> RawItem {
        serde_json::from_str(json).unwrap()
    }

    fn raw_receipt(json: &str) -> RawReceipt {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn categories_always_land_in_the_closed_sets() {
        let raw = raw_receipt(
            r#"{
                "receipt_type": "Stuff I Bought",
                "items": [
                    {"name": "Gadget", "total_price": 5.0, "category": "Electronics"},
                    {"name": "Milk", "total_price": 3.0, "category": "dairy & eggs"}
                ]
            }"#,
        );
        let draft = normalize(&raw);
        assert_eq!(draft.category, ExpenseCategory::Uncategorized);
        assert_eq!(draft.items[0].category, ItemCategory::Misc);
        assert_eq!(draft.items[1].category, ItemCategory::DairyEggs);
    }

    #[test]
    fn normalization_is_idempotent_to_the_byte() {
        let raw = raw_receipt(
            r#"{
                "schema_version": 2,
                "store_name": "  Shell ",
                "purchase_date": "2025-03-14",
                "total_amount": "35.00",
                "receipt_type": "Fuel",
                "items": [{"name": "Unleaded", "total_price": 35.0, "price_per_unit": 3.5}]
            }"#,
        );
        let first = serde_json::to_string(&normalize(&raw)).unwrap();
        let second = serde_json::to_string(&normalize(&raw)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fuel_quantity_derives_from_unit_price() {
        let item = raw_item(r#"{"name": "Unleaded", "total_price": 35.00, "price_per_unit": 3.50}"#);
        let normalized = normalize_item(&item, 2);
        assert!((normalized.quantity - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_unit_price_defaults_quantity_to_one() {
        let item = raw_item(r#"{"name": "Bread", "total_price": 2.50}"#);
        assert_eq!(normalize_item(&item, 2).quantity, 1.0);
    }

    #[test]
    fn printed_quantity_wins_over_derivation() {
        let item = raw_item(
            r#"{"name": "Eggs", "total_price": 6.0, "price_per_unit": 3.0, "quantity": 2}"#,
        );
        assert_eq!(normalize_item(&item, 2).quantity, 2.0);
    }

    #[test]
    fn revision_one_payloads_never_derive_quantity() {
        let raw = raw_receipt(
            r#"{
                "schema_version": 1,
                "items": [{"name": "Unleaded", "price": 35.00, "price_per_unit": 3.50}]
            }"#,
        );
        let draft = normalize(&raw);
        assert_eq!(draft.items[0].quantity, 1.0);
        assert_eq!(draft.items[0].total_price, 35.0);
    }

    #[test]
    fn zero_and_negative_quantities_are_invalid() {
        let item = raw_item(r#"{"name": "Milk", "total_price": 3.0, "quantity": 0}"#);
        assert_eq!(normalize_item(&item, 2).quantity, 1.0);
        let item = raw_item(r#"{"name": "Milk", "total_price": 3.0, "quantity": -2}"#);
        assert_eq!(normalize_item(&item, 2).quantity, 1.0);
    }

    #[test]
    fn money_is_clamped_non_negative() {
        let raw = raw_receipt(r#"{"total_amount": -12.0, "items": [{"name": "X", "total_price": -1}]}"#);
        let draft = normalize(&raw);
        assert_eq!(draft.total_amount, 0.0);
        assert_eq!(draft.items[0].total_price, 0.0);
    }

    #[test]
    fn absent_total_defaults_to_zero() {
        let draft = normalize(&raw_receipt(r#"{"store_name": "Kiosk"}"#));
        assert_eq!(draft.total_amount, 0.0);
        assert!(draft.items.is_empty());
    }

    #[test]
    fn dates_parse_strictly_or_stay_null() {
        let draft = normalize(&raw_receipt(r#"{"purchase_date": "2025-03-14"}"#));
        assert_eq!(draft.purchase_date, NaiveDate::from_ymd_opt(2025, 3, 14));

        let draft = normalize(&raw_receipt(r#"{"purchase_date": "sometime in March"}"#));
        assert!(draft.purchase_date.is_none());

        let draft = normalize(&raw_receipt(r#"{"purchase_date": "03/14/2025"}"#));
        assert!(draft.purchase_date.is_none());
    }

    #[test]
    fn blank_names_become_unknown() {
        let item = raw_item(r#"{"total_price": 1.0}"#);
        assert_eq!(normalize_item(&item, 2).name, "Unknown");
        let item = raw_item(r#"{"name": "   ", "total_price": 1.0}"#);
        assert_eq!(normalize_item(&item, 2).name, "Unknown");
    }

    #[test]
    fn blank_store_fields_stay_null() {
        let draft = normalize(&raw_receipt(r#"{"store_name": "  ", "store_address": ""}"#));
        assert!(draft.store_name.is_none());
        assert!(draft.store_address.is_none());
        assert_eq!(draft.store_label(), "Unknown");
    }
}
