//! Background schedulers
//!
//! Two long-lived periodic tasks beside the pipeline: a profile resync
//! that refreshes identity fields for every served member, and a liveness
//! heartbeat the dashboard reads. Both talk to the store through the same
//! interface as the pipeline and never fail the process.

use crate::chat::ChatApi;
use crate::db::{ReceiptStore, UserIdentity};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

/// Spawn both schedulers. They run until the process exits; the first
/// tick of each fires immediately, so a fresh start beats and resyncs
/// right away.
pub fn start_schedulers(
    chat: Arc<dyn ChatApi>,
    store: Arc<dyn ReceiptStore>,
    heartbeat_period: Duration,
    resync_period: Duration,
    service_name: String,
) {
    tokio::spawn(heartbeat_task(store.clone(), service_name, heartbeat_period));
    tokio::spawn(resync_task(chat, store, resync_period));
}

/// Stamp the service as alive on a short cadence. A failed write waits
/// for the next tick; the dashboard just sees a stale beat meanwhile.
async fn heartbeat_task(store: Arc<dyn ReceiptStore>, service_name: String, period: Duration) {
    let mut interval = time::interval(period);
    info!(period_secs = period.as_secs(), service = %service_name, "Heartbeat task started");

    loop {
        interval.tick().await;

        match store.write_heartbeat(&service_name).await {
            Ok(()) => debug!(service = %service_name, "Heartbeat written"),
            Err(e) => warn!(error = %e, "Heartbeat write failed"),
        }
    }
}

/// Refresh every member's identity fields on a long cadence.
async fn resync_task(chat: Arc<dyn ChatApi>, store: Arc<dyn ReceiptStore>, period: Duration) {
    let mut interval = time::interval(period);
    info!(period_secs = period.as_secs(), "Profile resync task started");

    loop {
        interval.tick().await;

        let (synced, failed) = resync_profiles(chat.as_ref(), store.as_ref()).await;
        info!(synced, failed, "Profile resync finished");
    }
}

/// Upsert identity fields for every non-bot member of every served guild.
/// Any single member or guild failure is logged and skipped; the sweep
/// always runs to the end. Returns (synced, failed).
pub async fn resync_profiles(chat: &dyn ChatApi, store: &dyn ReceiptStore) -> (usize, usize) {
    let guilds = match chat.list_guilds().await {
        Ok(guilds) => guilds,
        Err(e) => {
            warn!(error = %e, "Guild listing failed, resync skipped");
            return (0, 0);
        }
    };

    let mut synced = 0;
    let mut failed = 0;

    for guild in guilds {
        let members = match chat.list_guild_members(&guild.id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(guild = %guild.name, error = %e, "Member listing failed, guild skipped");
                failed += 1;
                continue;
            }
        };

        for member in members.iter().filter(|m| !m.bot) {
            let identity = UserIdentity::from_chat_user(member);
            match store.upsert_user(&identity).await {
                Ok(_) => synced += 1,
                Err(e) => {
                    warn!(discord_id = %member.id, error = %e, "Member upsert failed, continuing");
                    failed += 1;
                }
            }
        }
    }

    (synced, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, ChatUser, Guild};
    use crate::db::{NewReceipt, StoreError, UserRow};
    use crate::models::NormalizedItem;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn member(id: &str, bot: bool) -> ChatUser {
        ChatUser {
            id: id.to_string(),
            username: format!("user-{id}"),
            global_name: None,
            avatar: None,
            bot,
        }
    }

    struct FakeChat {
        guilds: Vec<Guild>,
        members: Vec<ChatUser>,
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn send_message(&self, _: &str, _: &str) -> Result<String, ChatError> {
            unimplemented!("resync never posts messages")
        }

        async fn edit_message(&self, _: &str, _: &str, _: &str) -> Result<(), ChatError> {
            unimplemented!("resync never edits messages")
        }

        async fn download(&self, _: &str) -> Result<Vec<u8>, ChatError> {
            unimplemented!("resync never downloads")
        }

        async fn list_guilds(&self) -> Result<Vec<Guild>, ChatError> {
            Ok(self.guilds.clone())
        }

        async fn list_guild_members(&self, _: &str) -> Result<Vec<ChatUser>, ChatError> {
            Ok(self.members.clone())
        }
    }

    /// Store that rejects upserts for one configured user id.
    struct FakeStore {
        reject_id: Option<String>,
        upserted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReceiptStore for FakeStore {
        async fn upsert_user(&self, identity: &UserIdentity) -> Result<UserRow, StoreError> {
            if self.reject_id.as_deref() == Some(identity.discord_id.as_str()) {
                return Err(StoreError::NetworkError("constraint".to_string()));
            }
            self.upserted.lock().unwrap().push(identity.discord_id.clone());
            Ok(UserRow {
                discord_id: identity.discord_id.clone(),
                display_name: Some(identity.display_name.clone()),
                handle: Some(identity.handle.clone()),
                avatar_url: identity.avatar_url.clone(),
                category_budgets: None,
                bot_response_template: None,
            })
        }

        async fn insert_receipt(&self, _: &NewReceipt) -> Result<i64, StoreError> {
            unimplemented!("resync never inserts receipts")
        }

        async fn insert_line_items(
            &self,
            _: i64,
            _: &[NormalizedItem],
        ) -> Result<usize, StoreError> {
            unimplemented!("resync never inserts items")
        }

        async fn write_heartbeat(&self, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn bot_accounts_are_never_synced() {
        let chat = FakeChat {
            guilds: vec![Guild {
                id: "g1".to_string(),
                name: "Household".to_string(),
            }],
            members: vec![member("1", false), member("2", true), member("3", false)],
        };
        let store = FakeStore {
            reject_id: None,
            upserted: Mutex::new(Vec::new()),
        };

        let (synced, failed) = resync_profiles(&chat, &store).await;
        assert_eq!((synced, failed), (2, 0));
        assert_eq!(*store.upserted.lock().unwrap(), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn one_failed_member_does_not_stop_the_sweep() {
        let chat = FakeChat {
            guilds: vec![Guild {
                id: "g1".to_string(),
                name: "Household".to_string(),
            }],
            members: vec![member("1", false), member("2", false), member("3", false)],
        };
        let store = FakeStore {
            reject_id: Some("2".to_string()),
            upserted: Mutex::new(Vec::new()),
        };

        let (synced, failed) = resync_profiles(&chat, &store).await;
        assert_eq!((synced, failed), (2, 1));
        assert_eq!(*store.upserted.lock().unwrap(), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn no_guilds_means_an_empty_sweep() {
        let chat = FakeChat {
            guilds: vec![],
            members: vec![],
        };
        let store = FakeStore {
            reject_id: None,
            upserted: Mutex::new(Vec::new()),
        };

        assert_eq!(resync_profiles(&chat, &store).await, (0, 0));
    }
}
