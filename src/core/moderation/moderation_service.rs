// Moderation engine - core business logic for handling chat events.
//
// This service handles:
// - Checking every new member against the spam registry
// - Restricting + removing confirmed spammers and announcing it
// - Answering the start/help commands
//
// NO Telegram dependencies here - the chat platform is reached through the
// ChatGateway port.

use super::moderation_models::{
    ChatEvent, ChatId, MemberEvent, MessageId, ModerationAction, ModerationMessages, NewMember,
    TextMessage,
};
use crate::core::spamlist::{CheckResult, DenylistSource, SnapshotStore, SpamRegistry, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Chat API request failed: {0}")]
    Request(String),

    #[error("Chat API rejected {method}: {description}")]
    Rejected { method: String, description: String },
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("{action} failed for user {user_id} in chat {chat_id}: {source}")]
    ActionFailed {
        action: ModerationAction,
        chat_id: ChatId,
        user_id: UserId,
        source: GatewayError,
    },
}

// ============================================================================
// GATEWAY TRAIT (PORT)
// ============================================================================

/// The chat platform operations the engine needs.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Strip the member's posting permissions.
    async fn restrict_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError>;

    /// Remove the member from the chat.
    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError>;

    /// Send a Markdown message, optionally as a reply to `reply_to`.
    async fn send_reply(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<(), GatewayError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Handles chat events. Cheap to share: wrap in `Arc` and call `dispatch`.
pub struct ModerationEngine<S: DenylistSource, P: SnapshotStore, G: ChatGateway> {
    registry: Arc<SpamRegistry<S, P>>,
    gateway: Arc<G>,
    messages: ModerationMessages,
    lookup_timeout: Duration,
}

impl<S, P, G> ModerationEngine<S, P, G>
where
    S: DenylistSource + 'static,
    P: SnapshotStore + 'static,
    G: ChatGateway + 'static,
{
    pub fn new(
        registry: Arc<SpamRegistry<S, P>>,
        gateway: Arc<G>,
        messages: ModerationMessages,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            messages,
            lookup_timeout,
        }
    }

    /// Handle an event on its own task so a slow lookup or API call never holds
    /// up the caller. Ignored events don't spawn anything.
    pub fn dispatch(self: &Arc<Self>, event: ChatEvent) -> Option<JoinHandle<()>> {
        if matches!(event, ChatEvent::Other) {
            return None;
        }

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            engine.handle_event(event).await;
        }))
    }

    pub async fn handle_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::MembersJoined(event) => {
                self.check_members(&event).await;
            }
            ChatEvent::Text(message) => {
                self.handle_command(&message).await;
            }
            ChatEvent::Other => {}
        }
    }

    /// Check every new member and moderate the spammers.
    ///
    /// Returns the members that were identified as spam. A failure for one member
    /// never stops the others from being processed.
    pub async fn check_members(&self, event: &MemberEvent) -> Vec<UserId> {
        tracing::debug!(
            chat_id = event.chat_id,
            "Got {} new member(s)",
            event.new_members.len()
        );

        let mut blocked = Vec::new();
        for member in &event.new_members {
            if self.check_member(event, member).await {
                blocked.push(member.user_id);
            }
        }
        blocked
    }

    async fn check_member(&self, event: &MemberEvent, member: &NewMember) -> bool {
        let chat_id = event.chat_id;
        let user_id = member.user_id;

        let result = match tokio::time::timeout(self.lookup_timeout, self.registry.check(user_id))
            .await
        {
            Ok(result) => result,
            Err(_) => CheckResult::LookupFailed(format!(
                "lookup timed out after {:?}",
                self.lookup_timeout
            )),
        };

        match result {
            CheckResult::Known { from_local } => {
                tracing::info!(
                    chat_id,
                    user_id,
                    user_name = %member.display_name,
                    from_local,
                    "Banning user"
                );

                // Remember fresh remote hits so the next check stays local
                if !from_local && self.registry.add(user_id).await {
                    tracing::debug!(user_id, "Added user to spam list");
                }

                self.reply(
                    chat_id,
                    Some(event.message_id),
                    &self.messages.blocked_for(&member.display_name),
                )
                .await;

                if let Err(e) = self.ban(chat_id, user_id).await {
                    tracing::error!(chat_id, user_id, error = %e, "Unable to ban user");
                    self.reply(chat_id, Some(event.message_id), &self.messages.unknown_error)
                        .await;
                }
                true
            }
            CheckResult::Unknown => {
                tracing::debug!(chat_id, user_id, "User is not in the spam list");
                false
            }
            CheckResult::LookupFailed(reason) => {
                // Fail open: never block a join we couldn't verify
                tracing::warn!(chat_id, user_id, reason = %reason, "Spam check failed, letting user in");
                false
            }
        }
    }

    /// Restrict, then remove. Both must succeed; nothing is retried.
    async fn ban(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ModerationError> {
        self.gateway
            .restrict_member(chat_id, user_id)
            .await
            .map_err(|source| ModerationError::ActionFailed {
                action: ModerationAction::Restrict,
                chat_id,
                user_id,
                source,
            })?;

        self.gateway
            .remove_member(chat_id, user_id)
            .await
            .map_err(|source| ModerationError::ActionFailed {
                action: ModerationAction::Remove,
                chat_id,
                user_id,
                source,
            })
    }

    /// Reply to a start/help command. Returns whether the text was a command.
    pub async fn handle_command(&self, message: &TextMessage) -> bool {
        match self.messages.reply_for_command(&message.text) {
            Some(reply) => {
                self.reply(message.chat_id, Some(message.message_id), reply)
                    .await;
                true
            }
            None => false,
        }
    }

    async fn reply(&self, chat_id: ChatId, reply_to: Option<MessageId>, text: &str) {
        tracing::debug!(chat_id, msg_id = ?reply_to, "Sending reply");
        if let Err(e) = self.gateway.send_reply(chat_id, reply_to, text).await {
            tracing::error!(chat_id, error = %e, "Unable to send the message");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
