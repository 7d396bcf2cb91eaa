//! Health and run-status endpoints
//!
//! Real uptime plus the last run failure on `/health`; per-process run
//! counters on `/status`.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Run counter snapshot
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub user_upsert_warnings: u64,
    pub item_insert_warnings: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.status.startup_time);
    let last_error = state.status.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "raccoon-bot".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        last_error,
    })
}

/// GET /status
pub async fn run_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = &state.status;

    Json(StatusResponse {
        service: state.service_name.clone(),
        runs_started: status.runs_started.load(Ordering::Relaxed),
        runs_succeeded: status.runs_succeeded.load(Ordering::Relaxed),
        runs_failed: status.runs_failed.load(Ordering::Relaxed),
        user_upsert_warnings: status.user_upsert_warnings.load(Ordering::Relaxed),
        item_insert_warnings: status.item_insert_warnings.load(Ordering::Relaxed),
    })
}

/// Build status routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(run_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusState;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            status: Arc::new(StatusState::new()),
            service_name: "discord_bot".to_string(),
        }
    }

    #[tokio::test]
    async fn health_reports_module_and_version() {
        let response = health_check(State(state())).await;
        assert_eq!(response.module, "raccoon-bot");
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert!(response.last_error.is_none());
    }

    #[tokio::test]
    async fn status_reflects_recorded_runs() {
        let state = state();
        state.status.record_run_started();
        state.status.record_run_started();
        state.status.record_run_succeeded();
        state
            .status
            .record_run_failed("extraction failed: timeout".to_string())
            .await;
        state.status.record_item_insert_warning();

        let response = run_status(State(state.clone())).await;
        assert_eq!(response.service, "discord_bot");
        assert_eq!(response.runs_started, 2);
        assert_eq!(response.runs_succeeded, 1);
        assert_eq!(response.runs_failed, 1);
        assert_eq!(response.item_insert_warnings, 1);
        assert_eq!(response.user_upsert_warnings, 0);

        let health = health_check(State(state)).await;
        assert_eq!(
            health.last_error.as_deref(),
            Some("extraction failed: timeout")
        );
    }
}
