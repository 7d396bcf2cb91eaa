//! Configuration loading
//!
//! Secrets are environment-only and required: startup fails fast, naming
//! every missing variable at once. Tunables come from an optional TOML
//! file (`--config` or `RACCOON_CONFIG`) over compiled defaults.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Bot token for the chat gateway and REST API.
pub const ENV_DISCORD_TOKEN: &str = "RACCOON_DISCORD_TOKEN";
/// API key for the vision extraction endpoint.
pub const ENV_EXTRACTION_API_KEY: &str = "RACCOON_EXTRACTION_API_KEY";
/// Base URL of the data store (REST surface and object storage).
pub const ENV_STORE_URL: &str = "RACCOON_STORE_URL";
/// Service key for the data store.
pub const ENV_STORE_KEY: &str = "RACCOON_STORE_KEY";
/// Optional path to the tunables TOML file.
pub const ENV_CONFIG_PATH: &str = "RACCOON_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {0}")]
    MissingSecrets(String),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Optional knobs with compiled defaults. Every field may be omitted from
/// the TOML file independently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// OpenAI-compatible API base, without the `/chat/completions` suffix.
    pub extraction_endpoint: String,
    pub extraction_model: String,
    /// Object storage bucket receipt photos land in.
    pub storage_bucket: String,
    pub heartbeat_interval_secs: u64,
    pub profile_resync_interval_secs: u64,
    /// Port the status/health HTTP server listens on.
    pub status_port: u16,
    /// Identity written to the heartbeat table.
    pub service_name: String,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            extraction_endpoint: "https://api.openai.com/v1".to_string(),
            extraction_model: "gpt-4o-mini".to_string(),
            storage_bucket: "receipts".to_string(),
            heartbeat_interval_secs: 60,
            profile_resync_interval_secs: 24 * 60 * 60,
            status_port: 5750,
            service_name: "discord_bot".to_string(),
        }
    }
}

impl Tunables {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub extraction_api_key: String,
    /// Store base URL, normalized without a trailing slash.
    pub store_url: String,
    pub store_key: String,
    pub tunables: Tunables,
}

impl Config {
    /// Load tunables (explicit path, else `RACCOON_CONFIG`, else defaults)
    /// and the four required secrets from the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Config, ConfigError> {
        let env_path = std::env::var(ENV_CONFIG_PATH).ok();
        let tunables = match config_path {
            Some(path) => Tunables::from_file(path)?,
            None => match env_path.as_deref() {
                Some(path) => Tunables::from_file(Path::new(path))?,
                None => Tunables::default(),
            },
        };
        Self::resolve(tunables, |name| std::env::var(name).ok())
    }

    /// Assemble a `Config` from resolved tunables and a secret lookup.
    /// Split out so tests can supply secrets without touching the process
    /// environment.
    pub fn resolve(
        tunables: Tunables,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str| -> String {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let discord_token = require(ENV_DISCORD_TOKEN);
        let extraction_api_key = require(ENV_EXTRACTION_API_KEY);
        let store_url = require(ENV_STORE_URL);
        let store_key = require(ENV_STORE_KEY);

        if !missing.is_empty() {
            return Err(ConfigError::MissingSecrets(missing.join(", ")));
        }

        Ok(Config {
            discord_token,
            extraction_api_key,
            store_url: store_url.trim_end_matches('/').to_string(),
            store_key,
            tunables,
        })
    }
}
