use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::trace;

use chatbuzz_types::events::GatewayEvent;

pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Deterministic delivery topic for messages addressed to `username`.
pub fn topic_for(username: &str) -> String {
    format!("/topic/messages/{username}")
}

/// The "deliver to topic T" primitive the delivery path depends on.
pub trait TopicPublisher: Send + Sync {
    /// Push `event` to every session currently subscribed to `topic`.
    /// Returns how many subscribers were reached; zero is not an error.
    fn publish(&self, topic: &str, event: GatewayEvent) -> impl Future<Output = usize> + Send;
}

/// Process-wide registry of which sessions listen on which topic.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    capacity: usize,

    /// topic -> sender shared by every subscribed session
    topics: RwLock<HashMap<String, broadcast::Sender<GatewayEvent>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// `capacity` bounds how many pushes a slow session may fall behind by
    /// before it starts skipping events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                capacity: capacity.max(1),
                topics: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to `topic`, creating it on first use.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<GatewayEvent> {
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe()
    }

    /// Forget `topic` if it has no receivers left. Sessions call this after
    /// dropping their receiver.
    pub async fn prune(&self, topic: &str) {
        let mut topics = self.inner.topics.write().await;
        if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(topic);
        }
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .await
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub async fn topic_count(&self) -> usize {
        self.inner.topics.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicPublisher for Dispatcher {
    async fn publish(&self, topic: &str, event: GatewayEvent) -> usize {
        let topics = self.inner.topics.read().await;
        let reached = topics
            .get(topic)
            .and_then(|tx| tx.send(event).ok())
            .unwrap_or(0);
        trace!("Published to {} ({} subscribers)", topic, reached);
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbuzz_types::models::MessagePayload;

    fn event(text: &str) -> GatewayEvent {
        GatewayEvent::Message {
            topic: topic_for("bob"),
            payload: MessagePayload::text(text),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.publish(&topic_for("bob"), event("hi")).await, 0);
        assert_eq!(dispatcher.topic_count().await, 0);
    }

    #[tokio::test]
    async fn every_subscriber_of_topic_receives() {
        let dispatcher = Dispatcher::new();
        let mut first = dispatcher.subscribe(&topic_for("bob")).await;
        let mut second = dispatcher.subscribe(&topic_for("bob")).await;
        let mut other = dispatcher.subscribe(&topic_for("carol")).await;

        assert_eq!(dispatcher.publish(&topic_for("bob"), event("hi")).await, 2);

        assert_eq!(first.recv().await.unwrap(), event("hi"));
        assert_eq!(second.recv().await.unwrap(), event("hi"));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn prune_forgets_topics_once_unsubscribed() {
        let dispatcher = Dispatcher::new();
        let topic = topic_for("bob");
        let a = dispatcher.subscribe(&topic).await;
        let b = dispatcher.subscribe(&topic).await;

        drop(a);
        dispatcher.prune(&topic).await;
        assert_eq!(dispatcher.subscriber_count(&topic).await, 1);
        assert_eq!(dispatcher.topic_count().await, 1);

        drop(b);
        dispatcher.prune(&topic).await;
        assert_eq!(dispatcher.subscriber_count(&topic).await, 0);
        assert_eq!(dispatcher.topic_count().await, 0);
    }

    #[tokio::test]
    async fn prune_ignores_unknown_topic() {
        let dispatcher = Dispatcher::new();
        let _rx = dispatcher.subscribe(&topic_for("bob")).await;

        dispatcher.prune(&topic_for("carol")).await;
        assert_eq!(dispatcher.topic_count().await, 1);
    }
}
