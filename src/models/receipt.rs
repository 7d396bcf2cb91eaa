//! Normalized receipt domain model and per-receipt ingest state machine
//!
//! A `NormalizedReceipt` is what the pipeline persists and reports: every
//! field repaired, every category coerced into the closed sets. The state
//! machine records how far a given photo made it through the pipeline.

use crate::models::categories::{ExpenseCategory, ItemCategory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One repaired line item, ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub name: String,
    pub total_price: f64,
    pub quantity: f64,
    pub category: ItemCategory,
}

/// A fully repaired receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReceipt {
    /// `None` when the photo showed no readable store name; defaulted at
    /// persistence and display time, not here.
    pub store_name: Option<String>,
    pub store_address: Option<String>,
    /// `None` when the printed date was absent or unparseable.
    pub purchase_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub category: ExpenseCategory,
    pub items: Vec<NormalizedItem>,
}

impl NormalizedReceipt {
    /// Store name for display and persistence.
    pub fn store_label(&self) -> &str {
        self.store_name.as_deref().unwrap_or("Unknown")
    }

    /// Purchase date for display, ISO formatted.
    pub fn date_label(&self) -> String {
        match self.purchase_date {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => "unknown date".to_string(),
        }
    }
}

/// Stages a receipt photo moves through, in order. `Failed` and
/// `Notified` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    /// Attachment accepted, nothing done yet.
    Received,
    /// Image bytes uploaded to object storage.
    AssetStored,
    /// Vision model returned a parseable payload.
    Extracted,
    /// Payload repaired into a `NormalizedReceipt`.
    Normalized,
    /// Receipt and line items written to the store.
    Persisted,
    /// Final acknowledgment delivered to the channel.
    Notified,
    /// Pipeline stopped; see the job's error text.
    Failed,
}

impl IngestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestState::Notified | IngestState::Failed)
    }
}

/// Tracking record for one receipt photo working through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: Uuid,
    /// Channel the photo arrived in (acknowledgments go back here).
    pub channel_id: String,
    /// Chat user id of the sender.
    pub author_id: String,
    pub state: IngestState,
    /// Failure description once `state` is `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(channel_id: impl Into<String>, author_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            state: IngestState::Received,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to `new_state`, rejecting transitions the pipeline never
    /// makes (skipping a stage, leaving a terminal state).
    pub fn transition_to(&mut self, new_state: IngestState) -> Result<(), String> {
        use IngestState::*;

        let allowed = match (self.state, new_state) {
            (Received, AssetStored) => true,
            (AssetStored, Extracted) => true,
            (Extracted, Normalized) => true,
            (Normalized, Persisted) => true,
            (Persisted, Notified) => true,
            // Any live stage may fail.
            (s, Failed) if !s.is_terminal() => true,
            _ => false,
        };

        if !allowed {
            return Err(format!(
                "invalid ingest transition: {:?} -> {:?}",
                self.state, new_state
            ));
        }

        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job failed with a reason. No-op guard against double
    /// failure is the caller's concern; terminal states still reject.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.transition_to(IngestState::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_stage() {
        let mut job = IngestJob::new("chan-1", "user-1");
        assert_eq!(job.state, IngestState::Received);
        for next in [
            IngestState::AssetStored,
            IngestState::Extracted,
            IngestState::Normalized,
            IngestState::Persisted,
            IngestState::Notified,
        ] {
            job.transition_to(next).unwrap();
        }
        assert!(job.is_terminal());
        assert!(job.error.is_none());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut job = IngestJob::new("chan-1", "user-1");
        assert!(job.transition_to(IngestState::Extracted).is_err());
        assert_eq!(job.state, IngestState::Received);
    }

    #[test]
    fn any_live_stage_may_fail() {
        let mut job = IngestJob::new("chan-1", "user-1");
        job.transition_to(IngestState::AssetStored).unwrap();
        job.fail("extraction timed out").unwrap();
        assert_eq!(job.state, IngestState::Failed);
        assert_eq!(job.error.as_deref(), Some("extraction timed out"));
    }

    #[test]
    fn terminal_states_stay_terminal() {
        let mut job = IngestJob::new("chan-1", "user-1");
        job.fail("bad image").unwrap();
        assert!(job.transition_to(IngestState::AssetStored).is_err());
        assert!(job.fail("again").is_err());
    }

    #[test]
    fn labels_cover_missing_fields() {
        let receipt = NormalizedReceipt {
            store_name: Some("Corner Mart".into()),
            store_address: None,
            purchase_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            total_amount: 9.99,
            category: ExpenseCategory::Groceries,
            items: vec![],
        };
        assert_eq!(receipt.store_label(), "Corner Mart");
        assert_eq!(receipt.date_label(), "2025-03-14");

        let bare = NormalizedReceipt {
            store_name: None,
            purchase_date: None,
            ..receipt
        };
        assert_eq!(bare.store_label(), "Unknown");
        assert_eq!(bare.date_label(), "unknown date");
    }
}
