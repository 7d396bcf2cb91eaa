//! raccoon-bot library interface
//!
//! Receipt ingestion service: photos posted in chat become categorized
//! receipt rows in the expense store. The binary wires the modules here
//! together; the library surface exists for integration testing.

pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod tasks;
pub mod workflow;

pub use crate::error::{IngestError, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide run counters and diagnostics, shared by the pipeline and
/// the status API. Counters reset when the process restarts.
pub struct StatusState {
    /// Service startup timestamp for uptime reporting.
    pub startup_time: DateTime<Utc>,
    pub runs_started: AtomicU64,
    pub runs_succeeded: AtomicU64,
    pub runs_failed: AtomicU64,
    pub user_upsert_warnings: AtomicU64,
    pub item_insert_warnings: AtomicU64,
    /// Most recent run failure, for diagnostics.
    pub last_error: RwLock<Option<String>>,
}

impl StatusState {
    pub fn new() -> Self {
        Self {
            startup_time: Utc::now(),
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            user_upsert_warnings: AtomicU64::new(0),
            item_insert_warnings: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_succeeded(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_run_failed(&self, detail: String) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write().await = Some(detail);
    }

    pub fn record_user_upsert_warning(&self) {
        self.user_upsert_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_insert_warning(&self) {
        self.item_insert_warnings.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state shared across status API handlers.
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<StatusState>,
    /// Identity written to the heartbeat table, echoed by `/status`.
    pub service_name: String,
}

/// Build the status API router.
pub fn build_router(state: AppState) -> Router {
    api::routes().with_state(state)
}
