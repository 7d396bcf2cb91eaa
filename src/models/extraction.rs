//! Raw extraction payload as returned by the vision model
//!
//! Everything here is deliberately loose: fields the model omits or types
//! it bends (numbers as strings) must survive deserialization so the
//! normalizer can repair them. Strictness lives downstream, not here.

use serde::{Deserialize, Deserializer};

/// Contract revision the extraction prompt currently requests.
pub const SCHEMA_VERSION: u32 = 2;

/// Untrusted receipt payload, straight out of the model's JSON reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReceipt {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub store_address: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub receipt_type: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
    /// Set by the model when the photo cannot be read as a receipt.
    #[serde(default)]
    pub error: Option<String>,
}

impl RawReceipt {
    /// True when the model declined the image (the `{"error": ...}` reply).
    pub fn is_unreadable(&self) -> bool {
        self.error.as_deref().map(|e| !e.is_empty()).unwrap_or(false)
    }
}

/// One extracted line item. `price` is the first contract revision's name
/// for `total_price`; both deserialize into the same field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "price", deserialize_with = "lenient_f64")]
    pub total_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_per_unit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Accepts a JSON number, a numeric string ("12.99", "$12.99"), or null.
/// Unparseable strings become `None` rather than a hard error.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Num(f64),
        Text(String),
        Null,
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Num(n) => Some(n),
        Lenient::Text(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        Lenient::Null => None,
    })
}
