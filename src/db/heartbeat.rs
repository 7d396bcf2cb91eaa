//! Service liveness row
//!
//! One row per service in `system_status`, overwritten on every beat. The
//! dashboard compares `last_heartbeat` against the wall clock to show the
//! bot as online.

use super::client::{StoreClient, StoreError, PREFER_MERGE};
use chrono::{DateTime, Utc};
use serde::Serialize;

const TABLE: &str = "system_status";

/// Upsert payload for one beat.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRecord {
    pub service_name: String,
    pub last_heartbeat: DateTime<Utc>,
}

/// Stamp the service as alive right now.
pub async fn write_heartbeat(client: &StoreClient, service_name: &str) -> Result<(), StoreError> {
    let record = HeartbeatRecord {
        service_name: service_name.to_string(),
        last_heartbeat: Utc::now(),
    };

    let url = format!("{}?on_conflict=service_name", client.table_url(TABLE));

    let response = client
        .post(url, Some(PREFER_MERGE))
        .json(&[&record])
        .send()
        .await
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    StoreClient::check(response).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_the_status_table_columns() {
        let record = HeartbeatRecord {
            service_name: "discord_bot".to_string(),
            last_heartbeat: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["service_name"], "discord_bot");
        assert!(value["last_heartbeat"].is_string());
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}
