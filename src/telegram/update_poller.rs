// Update poller - the single dispatch loop.
//
// Reads updates in the order Telegram delivers them and hands each one to the
// moderation engine as its own task. Handling order is not preserved; reading
// order is.

use std::sync::Arc;
use std::time::Duration;

use super::bot_api::TelegramApiClient;
use crate::core::moderation::{GatewayError, ModerationEngine};
use crate::core::spamlist::{DenylistSource, SnapshotStore};

const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct UpdatePoller<S: DenylistSource, P: SnapshotStore> {
    api: Arc<TelegramApiClient>,
    engine: Arc<ModerationEngine<S, P, TelegramApiClient>>,
    timeout_secs: u64,
    offset: i64,
}

impl<S, P> UpdatePoller<S, P>
where
    S: DenylistSource + 'static,
    P: SnapshotStore + 'static,
{
    pub fn new(
        api: Arc<TelegramApiClient>,
        engine: Arc<ModerationEngine<S, P, TelegramApiClient>>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            api,
            engine,
            timeout_secs,
            offset: 0,
        }
    }

    /// Poll forever. Stops only when the caller drops the future.
    pub async fn run(&mut self) {
        tracing::info!("Listening to the updates...");
        loop {
            if let Err(e) = self.poll_once().await {
                tracing::warn!(error = %e, "Unable to fetch updates, retrying in {:?}", RETRY_DELAY);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    /// Fetch one batch of updates and dispatch them.
    ///
    /// Returns how many events were handed to the engine.
    pub async fn poll_once(&mut self) -> Result<usize, GatewayError> {
        let updates = self.api.get_updates(self.offset, self.timeout_secs).await?;

        let mut dispatched = 0;
        for update in updates {
            // Acknowledge the update even if we ignore it
            self.offset = self.offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            if self.engine.dispatch(message.into_chat_event()).is_some() {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::ModerationMessages;
    use crate::core::spamlist::{SpamListError, SpamListSnapshot, SpamRegistry, UserId};
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;

    struct EmptySource;

    #[async_trait]
    impl DenylistSource for EmptySource {
        async fn fetch_all(&self) -> Result<Vec<UserId>, SpamListError> {
            Ok(Vec::new())
        }

        async fn lookup_one(&self, _user_id: UserId) -> Result<bool, SpamListError> {
            Ok(false)
        }
    }

    struct NoSnapshots;

    #[async_trait]
    impl SnapshotStore for NoSnapshots {
        async fn load(&self) -> Result<SpamListSnapshot, SpamListError> {
            Err(SpamListError::SnapshotLoad("not found".to_string()))
        }

        async fn save(&self, _snapshot: &SpamListSnapshot) -> Result<(), SpamListError> {
            Ok(())
        }
    }

    async fn poller_for(server: &mockito::ServerGuard) -> UpdatePoller<EmptySource, NoSnapshots> {
        let api = Arc::new(TelegramApiClient::new(&server.url(), "1:t", 1).unwrap());
        let registry = Arc::new(SpamRegistry::bootstrap(EmptySource, NoSnapshots).await);
        let messages = ModerationMessages {
            start_command: "/start".to_string(),
            help_command: "/help".to_string(),
            hello: "hi".to_string(),
            help: "help".to_string(),
            blocked: "{name} blocked".to_string(),
            unknown_error: "error".to_string(),
        };
        let engine = Arc::new(ModerationEngine::new(
            registry,
            Arc::clone(&api),
            messages,
            Duration::from_secs(1),
        ));
        UpdatePoller::new(api, engine, 1)
    }

    #[tokio::test]
    async fn test_poll_advances_offset_past_every_update() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("POST", "/bot1:t/getUpdates")
            .match_body(Matcher::PartialJson(json!({"offset": 0})))
            .with_status(200)
            .with_body(
                json!({
                    "ok": true,
                    "result": [
                        {"update_id": 40, "message": {"message_id": 1, "chat": {"id": 5}, "text": "chatting"}},
                        {"update_id": 41, "edited_message": {"message_id": 1}},
                        {"update_id": 42, "message": {"message_id": 2, "chat": {"id": 5}, "sticker": {}}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut poller = poller_for(&server).await;
        let dispatched = poller.poll_once().await.unwrap();

        // Only the text message reaches the engine
        assert_eq!(dispatched, 1);
        assert_eq!(poller.offset, 43);
    }

    #[tokio::test]
    async fn test_poll_error_keeps_offset() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/bot1:t/getUpdates")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let mut poller = poller_for(&server).await;
        poller.offset = 10;

        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.offset, 10);
    }
}
