//! User rows
//!
//! The upsert payload type carries identity fields only. Budgets and the
//! response template have no field here, so a merge cannot touch them no
//! matter what the store does with conflicting rows.

use super::client::{StoreClient, StoreError, PREFER_MERGE_REPRESENTATION};
use crate::chat::ChatUser;
use serde::{Deserialize, Serialize};

const TABLE: &str = "users";

/// Identity subset written on every upsert.
#[derive(Debug, Clone, Serialize)]
pub struct UserIdentity {
    pub discord_id: String,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    pub fn from_chat_user(user: &ChatUser) -> Self {
        Self {
            discord_id: user.id.clone(),
            display_name: user.display_name().to_string(),
            handle: user.username.clone(),
            avatar_url: user.avatar_url(),
        }
    }
}

/// Full row as the store returns it after a merge.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    pub discord_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Per-category budget map, owned by the dashboard.
    #[serde(default)]
    pub category_budgets: Option<serde_json::Value>,
    /// Personalized acknowledgment template, owned by the dashboard.
    #[serde(default)]
    pub bot_response_template: Option<String>,
}

/// Insert-or-refresh a user keyed by platform id, returning the merged
/// row (the response template rides back on it, saving a read).
pub async fn upsert_user(
    client: &StoreClient,
    identity: &UserIdentity,
) -> Result<UserRow, StoreError> {
    let url = format!("{}?on_conflict=discord_id", client.table_url(TABLE));

    let response = client
        .post(url, Some(PREFER_MERGE_REPRESENTATION))
        .json(&[identity])
        .send()
        .await
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    let rows: Vec<UserRow> = StoreClient::check(response)
        .await?
        .json()
        .await
        .map_err(|e| StoreError::ParseError(e.to_string()))?;

    rows.into_iter()
        .next()
        .ok_or(StoreError::MissingRepresentation)
}
