//! Chat platform boundary
//!
//! Event and user types shared by the gateway and REST client, plus the
//! `ChatApi` trait the pipeline talks through. Everything Discord-shaped
//! stays inside this module.

pub mod gateway;
pub mod rest;

pub use rest::ChatClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Filename extensions accepted as receipt photos.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Chat REST/gateway errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Chat API rejected the bot token")]
    Unauthorized,

    #[error("Chat API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message author (or guild member) as the platform reports them.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub username: String,
    /// Server-agnostic display name; absent for accounts that never set one.
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar image hash, not a URL.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl ChatUser {
    /// Name shown in the dashboard.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// CDN URL for the avatar, when one is set.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash))
    }
}

/// One uploaded file on a message.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    /// CDN download URL.
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    /// True when either the declared content type or the filename says
    /// this is a photo. Camera uploads sometimes omit the content type,
    /// so the extension check stays even though it is the weaker signal.
    pub fn is_image(&self) -> bool {
        if let Some(kind) = &self.content_type {
            if kind.starts_with("image/") {
                return true;
            }
        }
        let name = self.filename.to_ascii_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }
}

/// An inbound `MESSAGE_CREATE` event, trimmed to the fields the bot uses.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: ChatUser,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageEvent {
    /// The one attachment the pipeline will process, if any. Messages can
    /// carry several files; only the first image counts.
    pub fn first_image_attachment(&self) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.is_image())
    }

    /// True for the manual profile sync command.
    pub fn is_sync_command(&self) -> bool {
        self.content.trim() == "!sync"
    }
}

/// A guild (server) the bot is in.
#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

/// Outbound chat surface the pipeline and schedulers use.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message, returning its id for later edits.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, ChatError>;

    /// Replace the content of an earlier message.
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ChatError>;

    /// Fetch attachment bytes from the CDN.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ChatError>;

    /// Guilds the bot account is a member of.
    async fn list_guilds(&self) -> Result<Vec<Guild>, ChatError>;

    /// Every member of a guild (bot accounts included; callers filter).
    async fn list_guild_members(&self, guild_id: &str) -> Result<Vec<ChatUser>, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str, content_type: Option<&str>) -> Attachment {
        Attachment {
            id: "1".to_string(),
            filename: filename.to_string(),
            url: "https://cdn.example/x".to_string(),
            content_type: content_type.map(|s| s.to_string()),
        }
    }

    fn event_with(attachments: Vec<Attachment>) -> MessageEvent {
        MessageEvent {
            id: "10".to_string(),
            channel_id: "20".to_string(),
            content: String::new(),
            author: ChatUser {
                id: "30".to_string(),
                username: "casey".to_string(),
                global_name: None,
                avatar: None,
                bot: false,
            },
            attachments,
        }
    }

    #[test]
    fn first_image_attachment_skips_non_images() {
        let event = event_with(vec![
            attachment("notes.pdf", Some("application/pdf")),
            attachment("receipt.JPG", None),
            attachment("second.png", Some("image/png")),
        ]);
        let picked = event.first_image_attachment().unwrap();
        assert_eq!(picked.filename, "receipt.JPG");
    }

    #[test]
    fn content_type_counts_even_with_odd_filename() {
        let event = event_with(vec![attachment("IMG_0042", Some("image/jpeg"))]);
        assert!(event.first_image_attachment().is_some());
    }

    #[test]
    fn no_image_means_none() {
        let event = event_with(vec![attachment("report.txt", Some("text/plain"))]);
        assert!(event.first_image_attachment().is_none());
        assert!(event_with(vec![]).first_image_attachment().is_none());
    }

    #[test]
    fn sync_command_matches_trimmed_content_only() {
        let mut event = event_with(vec![]);
        event.content = "  !sync  ".to_string();
        assert!(event.is_sync_command());
        event.content = "!sync now".to_string();
        assert!(!event.is_sync_command());
    }

    #[test]
    fn display_name_prefers_global_name() {
        let mut user = ChatUser {
            id: "30".to_string(),
            username: "casey".to_string(),
            global_name: Some("Casey R".to_string()),
            avatar: Some("abc123".to_string()),
            bot: false,
        };
        assert_eq!(user.display_name(), "Casey R");
        assert_eq!(
            user.avatar_url().unwrap(),
            "https://cdn.discordapp.com/avatars/30/abc123.png"
        );
        user.global_name = None;
        assert_eq!(user.display_name(), "casey");
    }

    #[test]
    fn gateway_payload_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": "111",
            "channel_id": "222",
            "author": {"id": "333", "username": "casey"}
        }"#;
        let event: MessageEvent = serde_json::from_str(json).unwrap();
        assert!(event.attachments.is_empty());
        assert!(event.content.is_empty());
        assert!(!event.author.bot);
    }
}
