use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use chatbuzz_db::conversations::NewMessage;
use chatbuzz_db::{Database, StoreError};
use chatbuzz_types::events::GatewayEvent;
use chatbuzz_types::models::{ChatMessage, MessagePayload};

use crate::dispatcher::{Dispatcher, TopicPublisher, topic_for};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Routes a message from its sender to the receiver's topic, persisting it
/// first.
pub struct DeliveryRouter<P = Dispatcher> {
    db: Arc<Database>,
    publisher: P,
}

impl<P: Clone> Clone for DeliveryRouter<P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl<P: TopicPublisher> DeliveryRouter<P> {
    pub fn new(db: Arc<Database>, publisher: P) -> Self {
        Self { db, publisher }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Persist `payload` from `sender` to `receiver` and push it to the
    /// receiver's topic.
    ///
    /// Returns `Ok(None)` without persisting or pushing anything when either
    /// username does not resolve. A persistence failure is returned before any
    /// push happens. Having no live subscriber is not an error.
    pub async fn deliver(
        &self,
        sender: &str,
        receiver: &str,
        payload: MessagePayload,
    ) -> Result<Option<ChatMessage>, RouterError> {
        // Run blocking DB work off the async runtime
        let db = self.db.clone();
        let (sender_name, receiver_name) = (sender.to_string(), receiver.to_string());
        let stored_payload = payload.clone();
        let stored = tokio::task::spawn_blocking(move || -> chatbuzz_db::Result<Option<ChatMessage>> {
            let Some(from) = db.find_by_username(&sender_name)? else {
                return Ok(None);
            };
            let Some(to) = db.find_by_username(&receiver_name)? else {
                return Ok(None);
            };

            let message = NewMessage::from_payload(&from, &to, &stored_payload);
            db.append_message(&message).map(Some)
        })
        .await?
        .inspect_err(|e| error!("Failed to persist message {} -> {}: {}", sender, receiver, e))?;

        let Some(stored) = stored else {
            debug!("Dropping message {} -> {}: unresolved participant", sender, receiver);
            return Ok(None);
        };

        let topic = topic_for(receiver);
        let reached = self
            .publisher
            .publish(&topic, GatewayEvent::Message { topic: topic.clone(), payload })
            .await;
        debug!(
            "Delivered message {} {} -> {} ({} live sessions)",
            stored.id, sender, receiver, reached
        );

        Ok(Some(stored))
    }
}
