use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::update_models::{ApiResponse, Update, User};
use crate::core::moderation::{ChatGateway, ChatId, GatewayError, MessageId};
use crate::core::spamlist::UserId;

/// Extra time on top of the long-poll timeout before the HTTP request gives up.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

/// Minimal Telegram Bot API client. It only exposes the calls the bot needs.
pub struct TelegramApiClient {
    client: Client,
    /// `<api url>/bot<token>` - never log this, it contains the token
    base_url: String,
}

impl TelegramApiClient {
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs) + REQUEST_TIMEOUT_MARGIN)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Call a Bot API method and unwrap the `{ ok, result, description }` envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Result<T, GatewayError> {
        tracing::trace!(method, "Calling Telegram API");

        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&payload)
            .send()
            .await
            // The URL contains the token
            .map_err(|e| GatewayError::Request(e.without_url().to_string()))?;

        let status = resp.status();
        let envelope: ApiResponse<T> = resp.json().await.map_err(|e| {
            GatewayError::Request(format!("{} returned {}: {}", method, status, e.without_url()))
        })?;

        if !envelope.ok {
            return Err(GatewayError::Rejected {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| GatewayError::Request(format!("{} returned no result", method)))
    }

    /// Check the token and fetch the bot's own account.
    pub async fn get_me(&self) -> Result<User, GatewayError> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, GatewayError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

#[async_trait]
impl ChatGateway for TelegramApiClient {
    async fn restrict_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        let _: bool = self
            .call(
                "restrictChatMember",
                json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                    "permissions": {
                        "can_send_messages": false,
                        "can_send_audios": false,
                        "can_send_documents": false,
                        "can_send_photos": false,
                        "can_send_videos": false,
                        "can_send_video_notes": false,
                        "can_send_voice_notes": false,
                        "can_send_polls": false,
                        "can_send_other_messages": false,
                        "can_add_web_page_previews": false,
                    },
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        let _: bool = self
            .call(
                "banChatMember",
                json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_reply(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<(), GatewayError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(message_id) = reply_to {
            payload["reply_to_message_id"] = json!(message_id);
        }

        let _: Value = self.call("sendMessage", payload).await?;
        Ok(())
    }
}
