//! Discord REST client
//!
//! v10 HTTP surface: channel messages for acknowledgments, the CDN for
//! attachment bytes, and guild/member listing for the profile resync.

use super::{ChatApi, ChatError, ChatUser, Guild};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = concat!("raccoon-bot/", env!("CARGO_PKG_VERSION"));
/// Largest page the member endpoint allows.
const MEMBER_PAGE_SIZE: usize = 1000;

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
}

/// Guild member envelope; the user is absent for webhook-only entries.
#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    user: Option<ChatUser>,
}

/// REST client authenticated with the bot token.
pub struct ChatClient {
    http_client: reqwest::Client,
    token: String,
}

impl ChatClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            token: token.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        let status = response.status();

        if status == 401 {
            return Err(ChatError::Unauthorized);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, ChatError> {
        let response = self
            .http_client
            .post(format!("{}/channels/{}/messages", API_BASE, channel_id))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&MessagePayload { content })
            .send()
            .await
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        let message: MessageResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::ParseError(e.to_string()))?;

        Ok(message.id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ChatError> {
        let response = self
            .http_client
            .patch(format!(
                "{}/channels/{}/messages/{}",
                API_BASE, channel_id, message_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&MessagePayload { content })
            .send()
            .await
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ChatError> {
        // CDN links are pre-signed; no bot auth on this request.
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn list_guilds(&self) -> Result<Vec<Guild>, ChatError> {
        let response = self
            .http_client
            .get(format!("{}/users/@me/guilds", API_BASE))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::ParseError(e.to_string()))
    }

    async fn list_guild_members(&self, guild_id: &str) -> Result<Vec<ChatUser>, ChatError> {
        let mut members = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/guilds/{}/members?limit={}",
                API_BASE, guild_id, MEMBER_PAGE_SIZE
            );
            if let Some(after_id) = &after {
                url.push_str("&after=");
                url.push_str(after_id);
            }

            let response = self
                .http_client
                .get(url)
                .header(reqwest::header::AUTHORIZATION, self.auth_header())
                .send()
                .await
                .map_err(|e| ChatError::NetworkError(e.to_string()))?;

            let page: Vec<GuildMember> = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| ChatError::ParseError(e.to_string()))?;

            let page_len = page.len();
            // Pages are sorted by user id; the last id is the next cursor.
            after = page
                .iter()
                .filter_map(|m| m.user.as_ref())
                .last()
                .map(|u| u.id.clone());
            members.extend(page.into_iter().filter_map(|m| m.user));

            if page_len < MEMBER_PAGE_SIZE || after.is_none() {
                break;
            }
        }

        tracing::debug!(guild_id = %guild_id, members = members.len(), "Listed guild members");
        Ok(members)
    }
}
