//! Vision extraction client
//!
//! Sends the receipt photo to an OpenAI-compatible chat completions
//! endpoint and parses the structured reply. The prompt pins the output
//! contract: versioned schema, both closed category sets, the fuel
//! quantity rule, and the unreadable-image escape hatch.

use crate::models::categories::{ExpenseCategory, ItemCategory};
use crate::models::extraction::{RawReceipt, SCHEMA_VERSION};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("raccoon-bot/", env!("CARGO_PKG_VERSION"));

/// Extraction client errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Extraction API rejected the key")]
    InvalidApiKey,

    #[error("Extraction API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Extraction API returned no choices")]
    EmptyResponse,

    #[error("Model reply is not valid receipt JSON: {0}")]
    MalformedPayload(String),

    #[error("Model could not read the image as a receipt")]
    Unreadable,
}

impl ExtractionError {
    /// Contract breaches (bad or refused payloads) read differently to the
    /// user than transport problems.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            ExtractionError::MalformedPayload(_) | ExtractionError::Unreadable
        )
    }
}

/// Turns a receipt photo into an untrusted `RawReceipt`.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, image: &[u8], content_type: &str)
        -> Result<RawReceipt, ExtractionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Vision model client for the OpenAI-compatible surface.
pub struct ExtractionClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ExtractionClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

/// The extraction prompt. Every rule the normalizer relies on is stated
/// here so model drift shows up as a contract breach, not silent garbage.
pub fn build_prompt() -> String {
    let receipt_categories = ExpenseCategory::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    let item_categories = ItemCategory::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a receipt parser. Analyze the receipt photo and return ONLY a JSON object in this exact shape:
{{
    "schema_version": {SCHEMA_VERSION},
    "store_name": "Store Name",
    "store_address": "Street address printed on the receipt, or null",
    "purchase_date": "YYYY-MM-DD or null if not printed",
    "total_amount": 12.34,
    "receipt_type": "one of: {receipt_categories}",
    "items": [
        {{"name": "Milk", "total_price": 4.00, "price_per_unit": null, "quantity": 1, "category": "Dairy & Eggs"}}
    ]
}}
Rules:
1. Extract every purchased item. Ignore tax, subtotal, and payment lines.
2. Categorize each item into EXACTLY one of: {item_categories}.
3. "receipt_type" must be EXACTLY one of the listed values.
4. For fuel receipts sold by volume, fill "price_per_unit" and leave "quantity" null unless printed; quantity = total_price / price_per_unit.
5. Use numbers for amounts, never strings.
If you can't read it, return {{"error": "unreadable"}}."#
    )
}

/// Strip a markdown code fence if the model wrapped its JSON in one.
fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    if trimmed.starts_with("```") {
        if let Some(start) = trimmed.find('\n') {
            let after_first_line = &trimmed[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    trimmed.to_string()
}

#[async_trait]
impl ReceiptExtractor for ExtractionClient {
    async fn extract(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<RawReceipt, ExtractionError> {
        let data_url = format!("data:{};base64,{}", content_type, BASE64.encode(image));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: build_prompt(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 2000,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        tracing::debug!(model = %self.model, size = image.len(), "Requesting receipt extraction");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(ExtractionError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::ApiError(status.as_u16(), error_text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedPayload(e.to_string()))?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or(ExtractionError::EmptyResponse)?;

        parse_reply(&content)
    }
}

/// Parse the model's text reply into a `RawReceipt`, honoring the
/// unreadable-image convention.
pub fn parse_reply(content: &str) -> Result<RawReceipt, ExtractionError> {
    let json = extract_json(content);
    let raw: RawReceipt = serde_json::from_str(&json)
        .map_err(|e| ExtractionError::MalformedPayload(e.to_string()))?;

    if raw.is_unreadable() {
        return Err(ExtractionError::Unreadable);
    }

    tracing::info!(
        store = raw.store_name.as_deref().unwrap_or("<none>"),
        items = raw.items.len(),
        "Receipt extracted"
    );

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ExtractionClient::new("https://api.openai.com/v1", "gpt-4o-mini", "sk-x");
        assert!(client.is_ok());
    }

    #[test]
    fn prompt_embeds_both_category_sets() {
        let prompt = build_prompt();
        for category in ExpenseCategory::ALL {
            assert!(prompt.contains(category.label()), "missing {}", category.label());
        }
        for category in ItemCategory::ALL {
            assert!(prompt.contains(category.label()), "missing {}", category.label());
        }
    }

    #[test]
    fn prompt_states_the_fuel_rule_and_schema_version() {
        let prompt = build_prompt();
        assert!(prompt.contains("quantity = total_price / price_per_unit"));
        assert!(prompt.contains("\"schema_version\": 2"));
        assert!(prompt.contains(r#"{"error": "unreadable"}"#));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = "```json\n{\"store_name\": \"Aldi\"}\n```";
        assert_eq!(extract_json(fenced), "{\"store_name\": \"Aldi\"}");
        let bare = "  {\"store_name\": \"Aldi\"}  ";
        assert_eq!(extract_json(bare), "{\"store_name\": \"Aldi\"}");
    }

    #[test]
    fn unreadable_reply_is_a_schema_violation() {
        let err = parse_reply(r#"{"error": "unreadable"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable));
        assert!(err.is_schema_violation());
    }

    #[test]
    fn non_json_reply_is_a_schema_violation() {
        let err = parse_reply("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedPayload(_)));
        assert!(err.is_schema_violation());
    }

    #[test]
    fn transport_failures_are_not_schema_violations() {
        assert!(!ExtractionError::NetworkError("timeout".into()).is_schema_violation());
        assert!(!ExtractionError::ApiError(429, "quota".into()).is_schema_violation());
        assert!(!ExtractionError::EmptyResponse.is_schema_violation());
    }

    #[test]
    fn valid_reply_parses() {
        let raw = parse_reply(
            r#"{"schema_version": 2, "store_name": "Shell", "total_amount": 48.2, "items": []}"#,
        )
        .unwrap();
        assert_eq!(raw.store_name.as_deref(), Some("Shell"));
    }
}
