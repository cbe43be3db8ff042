use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use intentfi_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    MessageAccepted,
    ReplyReady,
    PromptForwarded,
    AcknowledgementReceived,
    TaskFailed,
}

impl Topic {
    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::MessageAccepted { .. } => Topic::MessageAccepted,
            BusMessage::ReplyReady { .. } => Topic::ReplyReady,
            BusMessage::PromptForwarded { .. } => Topic::PromptForwarded,
            BusMessage::AcknowledgementReceived { .. } => Topic::AcknowledgementReceived,
            BusMessage::TaskFailed { .. } => Topic::TaskFailed,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

/// In-process topic fan-out. Slow subscribers lose messages instead of
/// blocking publishers.
pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        fan_out(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

/// Publish-only handle that can be cloned into handlers.
#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        fan_out(&self.subscribers, msg).await
    }
}

async fn fan_out(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let subs = subscribers.read().await;
    if let Some(subscribers) = subs.get(&topic) {
        for tx in subscribers {
            let _ = tx.try_send(msg.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use intentfi_schema::{ConversationId, OutboundMessage, StructuredOutputPrompt};
    use tokio::time::{timeout, Duration};
    use uuid::Uuid;

    fn reply_ready_message() -> BusMessage {
        BusMessage::ReplyReady {
            outbound: OutboundMessage {
                trace_id: Uuid::new_v4(),
                channel_type: "mailbox".to_string(),
                recipient: "agent1qsender".to_string(),
                text: "reply".to_string(),
                at: Utc::now(),
                reply_to: None,
            },
        }
    }

    #[tokio::test]
    async fn publish_to_no_subscribers_succeeds() {
        let bus = EventBus::new(8);
        let msg = BusMessage::MessageAccepted {
            trace_id: Uuid::new_v4(),
        };

        assert!(bus.publish(msg).await.is_ok());
    }

    #[tokio::test]
    async fn multiple_subscribers_same_topic() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe(Topic::ReplyReady).await;
        let mut rx2 = bus.subscribe(Topic::ReplyReady).await;

        bus.publish(reply_ready_message()).await.unwrap();

        let got1 = timeout(Duration::from_millis(100), rx1.recv())
            .await
            .unwrap()
            .unwrap();
        let got2 = timeout(Duration::from_millis(100), rx2.recv())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(got1, BusMessage::ReplyReady { .. }));
        assert!(matches!(got2, BusMessage::ReplyReady { .. }));
    }

    #[tokio::test]
    async fn different_topics_no_crosstalk() {
        let bus = EventBus::new(8);
        let mut reply_rx = bus.subscribe(Topic::ReplyReady).await;

        bus.publish(BusMessage::TaskFailed {
            trace_id: Uuid::new_v4(),
            error: "boom".into(),
        })
        .await
        .unwrap();

        let received = timeout(Duration::from_millis(100), reply_rx.recv()).await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn publisher_reaches_bus_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::PromptForwarded).await;
        let publisher = bus.publisher().clone();

        publisher
            .publish(BusMessage::PromptForwarded {
                trace_id: Uuid::new_v4(),
                conversation_id: ConversationId("c-1".into()),
                recipient: "agent1qcollab".into(),
                prompt: StructuredOutputPrompt {
                    prompt: "hi".into(),
                    output_schema: serde_json::json!({}),
                },
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            BusMessage::PromptForwarded {
                conversation_id, ..
            } => assert_eq!(conversation_id.0, "c-1"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_subscriber_drops_instead_of_blocking() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe(Topic::ReplyReady).await;

        bus.publish(reply_ready_message()).await.unwrap();
        bus.publish(reply_ready_message()).await.unwrap();

        let first = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(first.is_ok());

        let second = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }
}
