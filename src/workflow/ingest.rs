//! Ingestion orchestrator
//!
//! One pipeline run per qualifying message. A run posts an in-place
//! status message, then walks download, upload, extraction, normalization,
//! and persistence strictly in order, editing the status message to the
//! final text. Runs are independent: a failure ends its own run with one
//! user-visible line and never touches other in-flight runs.

use crate::chat::{Attachment, ChatApi, MessageEvent};
use crate::db::{ReceiptStore, UserIdentity};
use crate::error::IngestError;
use crate::models::{IngestJob, IngestState};
use crate::services::object_storage::random_asset_path;
use crate::services::{privacy, AssetStore, ReceiptExtractor};
use crate::workflow::{normalize, persist, respond};
use crate::StatusState;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything one ingest run needs. Cloned per message; every handle is
/// shared, so clones are cheap.
#[derive(Clone)]
pub struct Pipeline {
    chat: Arc<dyn ChatApi>,
    extractor: Arc<dyn ReceiptExtractor>,
    assets: Arc<dyn AssetStore>,
    store: Arc<dyn ReceiptStore>,
    status: Arc<StatusState>,
}

impl Pipeline {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        extractor: Arc<dyn ReceiptExtractor>,
        assets: Arc<dyn AssetStore>,
        store: Arc<dyn ReceiptStore>,
        status: Arc<StatusState>,
    ) -> Self {
        Self {
            chat,
            extractor,
            assets,
            store,
            status,
        }
    }

    /// Route one inbound message: manual sync command, receipt photo, or
    /// nothing the bot cares about.
    pub async fn handle_message(&self, event: MessageEvent) {
        if event.is_sync_command() {
            self.sync_profile(&event).await;
            return;
        }

        let Some(attachment) = event.first_image_attachment().cloned() else {
            return;
        };
        self.ingest(event, attachment).await;
    }

    /// `!sync`: refresh the author's identity fields on demand.
    async fn sync_profile(&self, event: &MessageEvent) {
        let identity = UserIdentity::from_chat_user(&event.author);
        match self.store.upsert_user(&identity).await {
            Ok(_) => {
                info!(discord_id = %identity.discord_id, "Profile synced on command");
                if let Err(e) = self
                    .chat
                    .send_message(&event.channel_id, respond::SYNC_CONFIRMATION)
                    .await
                {
                    warn!(error = %e, "Sync confirmation not delivered");
                }
            }
            Err(e) => {
                warn!(discord_id = %identity.discord_id, error = %e, "Manual profile sync failed");
            }
        }
    }

    /// Drive one receipt photo to a terminal state.
    async fn ingest(&self, event: MessageEvent, attachment: Attachment) {
        let mut job = IngestJob::new(&event.channel_id, &event.author.id);
        self.status.record_run_started();
        info!(
            job_id = %job.id,
            message_id = %event.id,
            file = %attachment.filename,
            "Receipt photo received"
        );

        // The in-place acknowledgment. Without it there is nowhere to
        // report an outcome, so the run is abandoned.
        let status_message = match self
            .chat
            .send_message(&event.channel_id, respond::PROCESSING_TEXT)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Could not post status message, abandoning run");
                return;
            }
        };

        match self.run_stages(&event, &attachment, &mut job).await {
            Ok(success_text) => {
                self.status.record_run_succeeded();
                match self
                    .chat
                    .edit_message(&event.channel_id, &status_message, &success_text)
                    .await
                {
                    Ok(()) => {
                        advance(&mut job, IngestState::Notified);
                        info!(job_id = %job.id, "Receipt ingested");
                    }
                    Err(e) => {
                        // The receipt is saved; only the acknowledgment is lost.
                        warn!(job_id = %job.id, error = %e, "Success acknowledgment not delivered");
                    }
                }
            }
            Err(e) => {
                let class = e.class();
                error!(
                    job_id = %job.id,
                    class = class.as_str(),
                    error = %e,
                    "Ingest run failed"
                );
                self.status.record_run_failed(e.to_string()).await;
                if let Err(transition) = job.fail(e.to_string()) {
                    warn!(job_id = %job.id, "{transition}");
                }
                if let Err(edit) = self
                    .chat
                    .edit_message(&event.channel_id, &status_message, respond::compose_failure(class))
                    .await
                {
                    warn!(job_id = %job.id, error = %edit, "Failure message not delivered");
                }
            }
        }
    }

    /// The fallible stages, strictly sequential. Returns the success text
    /// for the final edit.
    async fn run_stages(
        &self,
        event: &MessageEvent,
        attachment: &Attachment,
        job: &mut IngestJob,
    ) -> Result<String, IngestError> {
        // Received -> AssetStored
        let bytes = self
            .chat
            .download(&attachment.url)
            .await
            .map_err(|e| IngestError::Storage(format!("attachment download: {e}")))?;
        if bytes.is_empty() {
            return Err(IngestError::Storage(
                "attachment download returned no bytes".to_string(),
            ));
        }

        let prepared = privacy::prepare(bytes, attachment.content_type.as_deref());
        let asset_path = random_asset_path(&prepared.extension);
        self.assets
            .put(&asset_path, prepared.bytes.clone(), &prepared.content_type)
            .await
            .map_err(|e| IngestError::Storage(format!("photo upload: {e}")))?;
        let image_url = self.assets.public_url(&asset_path);
        advance(job, IngestState::AssetStored);

        // AssetStored -> Extracted
        let raw = self
            .extractor
            .extract(&prepared.bytes, &prepared.content_type)
            .await?;
        advance(job, IngestState::Extracted);

        // Extracted -> Normalized (pure, cannot fail)
        let receipt = normalize(&raw);
        advance(job, IngestState::Normalized);

        // Normalized -> Persisted
        let identity = UserIdentity::from_chat_user(&event.author);
        let persisted = persist(
            self.store.as_ref(),
            &identity,
            &receipt,
            &image_url,
            &asset_path,
        )
        .await?;
        advance(job, IngestState::Persisted);

        if persisted.warnings.user_upsert {
            self.status.record_user_upsert_warning();
        }
        if persisted.warnings.item_insert {
            self.status.record_item_insert_warning();
        }

        info!(
            job_id = %job.id,
            receipt_id = persisted.receipt_id,
            items = persisted.items_written,
            store = receipt.store_label(),
            "Receipt persisted"
        );

        let template = persisted.user.and_then(|u| u.bot_response_template);
        Ok(respond::compose_success(
            template.as_deref(),
            &receipt,
            receipt.items.len(),
        ))
    }
}

/// Advance the job's state machine. The pipeline only requests legal
/// transitions; a rejection here is a bug worth a log line, not a panic.
fn advance(job: &mut IngestJob, state: IngestState) {
    if let Err(e) = job.transition_to(state) {
        warn!(job_id = %job.id, "{e}");
    }
}
