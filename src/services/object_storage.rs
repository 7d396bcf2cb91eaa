//! Object storage client for receipt photos
//!
//! Speaks the store's storage REST surface: an authenticated upload into a
//! bucket plus public URL derivation so the dashboard can show the photo.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const USER_AGENT: &str = concat!("raccoon-bot/", env!("CARGO_PKG_VERSION"));

/// Storage client errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage rejected the service key")]
    Unauthorized,

    #[error("Storage API error {0}: {1}")]
    ApiError(u16, String),
}

/// Where receipt photo bytes go. The pipeline only ever uploads and asks
/// for the public URL, so that is the whole surface.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload `bytes` under `path` inside the receipt bucket.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Public, unauthenticated URL for a previously uploaded object.
    fn public_url(&self, path: &str) -> String;
}

/// Collision-free object name for a new upload.
pub fn random_asset_path(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension)
}

/// REST client for the store's object storage.
pub struct StorageClient {
    http_client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl StorageClient {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

#[async_trait]
impl AssetStore for StorageClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        tracing::debug!(path = %path, size = bytes.len(), "Uploading receipt photo");

        let response = self
            .http_client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(StorageError::Unauthorized);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StorageError::ApiError(status.as_u16(), error_text));
        }

        tracing::info!(path = %path, "Receipt photo stored");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}
