//! REST plumbing for the structured data store
//!
//! The store exposes PostgREST-style table endpoints under `/rest/v1/`.
//! Every request carries the service key twice (`apikey` header and
//! bearer token) and states its write semantics through `Prefer`.

use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("raccoon-bot/", env!("CARGO_PKG_VERSION"));

/// Data store client errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Store rejected the service key")]
    Unauthorized,

    #[error("Store API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Store returned no row for a write that requested one")]
    MissingRepresentation,
}

/// Upsert that merges on conflict and echoes the merged row back.
pub(crate) const PREFER_MERGE_REPRESENTATION: &str =
    "resolution=merge-duplicates,return=representation";
/// Upsert that merges on conflict silently.
pub(crate) const PREFER_MERGE: &str = "resolution=merge-duplicates";
/// Insert that echoes the created row back.
pub(crate) const PREFER_REPRESENTATION: &str = "return=representation";

/// Authenticated client for the store's table endpoints.
pub struct StoreClient {
    http_client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl StoreClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    pub(crate) fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// POST to a table endpoint with auth; plain inserts pass no `Prefer`.
    pub(crate) fn post(&self, url: String, prefer: Option<&str>) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .post(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key);
        if let Some(prefer) = prefer {
            builder = builder.header("Prefer", prefer);
        }
        builder
    }

    pub(crate) async fn check(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();

        if status == 401 || status == 403 {
            return Err(StoreError::Unauthorized);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }
}
