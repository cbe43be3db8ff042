use std::sync::Arc;

use chrono::Utc;
use intentfi_bus::BusPublisher;
use intentfi_core::format::{EMERGENCY_REPLY, UNREADABLE_COLLABORATOR_REPLY};
use intentfi_core::{PendingConversations, Responder};
use intentfi_schema::*;
use uuid::Uuid;

pub const MAILBOX_CHANNEL: &str = "mailbox";

/// What happened to an inbound message.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Replied(OutboundMessage),
    /// Handed to the collaborator; the answer comes back as a structured response
    Forwarded(ConversationId),
}

impl Dispatch {
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            Self::Replied(outbound) => Some(&outbound.text),
            Self::Forwarded(_) => None,
        }
    }
}

enum Outcome {
    Reply(String),
    Forward(String),
}

pub struct Gateway {
    responder: Responder,
    bus: BusPublisher,
    pending: Arc<PendingConversations>,
    collaborator: Option<String>,
}

impl Gateway {
    pub fn new(
        responder: Responder,
        bus: BusPublisher,
        pending: Arc<PendingConversations>,
        collaborator: Option<String>,
    ) -> Self {
        Self {
            responder,
            bus,
            pending,
            collaborator,
        }
    }

    pub fn collaborator(&self) -> Option<&str> {
        self.collaborator.as_deref()
    }

    /// Answers one inbound message. Every path ends in a reply or a
    /// forwarded prompt; a crashed handler answers with the emergency text.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Dispatch {
        let trace_id = inbound.trace_id;
        tracing::info!(%trace_id, sender = %inbound.sender, "message accepted");

        let _ = self
            .bus
            .publish(BusMessage::MessageAccepted { trace_id })
            .await;

        let responder = self.responder.clone();
        let collaborator = self.collaborator.clone();
        let text = inbound.text.clone();
        let task = tokio::spawn(async move {
            if let Some(reply) = responder.direct(&text).await {
                return Outcome::Reply(reply);
            }
            match collaborator {
                Some(address) => Outcome::Forward(address),
                None => Outcome::Reply(responder.fallback(&text).await),
            }
        });

        match task.await {
            Ok(Outcome::Reply(text)) => Dispatch::Replied(self.reply(&inbound, text).await),
            Ok(Outcome::Forward(address)) => {
                Dispatch::Forwarded(self.forward(&inbound, address).await)
            }
            Err(err) => {
                tracing::error!(%trace_id, error = %err, "message handling failed");
                let _ = self
                    .bus
                    .publish(BusMessage::TaskFailed {
                        trace_id,
                        error: err.to_string(),
                    })
                    .await;
                Dispatch::Replied(self.reply(&inbound, EMERGENCY_REPLY.to_string()).await)
            }
        }
    }

    async fn reply(&self, inbound: &InboundMessage, text: String) -> OutboundMessage {
        let outbound = OutboundMessage::reply(inbound, text);
        let _ = self
            .bus
            .publish(BusMessage::ReplyReady {
                outbound: outbound.clone(),
            })
            .await;
        outbound
    }

    async fn forward(&self, inbound: &InboundMessage, collaborator: String) -> ConversationId {
        let conversation_id = ConversationId::generate();
        self.pending
            .insert(conversation_id.clone(), inbound.sender.clone());

        tracing::info!(
            trace_id = %inbound.trace_id,
            conversation_id = %conversation_id,
            collaborator = %collaborator,
            "message forwarded to collaborator"
        );

        let _ = self
            .bus
            .publish(BusMessage::PromptForwarded {
                trace_id: inbound.trace_id,
                conversation_id: conversation_id.clone(),
                recipient: collaborator,
                prompt: collaborator_prompt(&conversation_id, &inbound.text),
            })
            .await;
        conversation_id
    }

    /// Routes a collaborator answer back to the user who asked. Unknown or
    /// expired conversations are dropped.
    pub async fn handle_structured_response(
        &self,
        sender: &str,
        response: &StructuredOutputResponse,
    ) -> Option<OutboundMessage> {
        let Some(conversation_id) = response.conversation_id() else {
            tracing::warn!(sender, "structured response without conversation id");
            return None;
        };
        let Some(recipient) = self.pending.take(&conversation_id) else {
            tracing::warn!(
                sender,
                conversation_id = %conversation_id,
                "no pending conversation for structured response"
            );
            return None;
        };

        let text = response
            .response_text()
            .unwrap_or(UNREADABLE_COLLABORATOR_REPLY);
        Some(self.reply_to_pending(recipient, text.to_string()).await)
    }

    /// The prompt never reached the collaborator: answer the waiting user
    /// with the emergency text instead of letting the entry expire.
    pub async fn handle_forward_failure(
        &self,
        trace_id: Uuid,
        conversation_id: &ConversationId,
    ) -> Option<OutboundMessage> {
        let recipient = self.pending.take(conversation_id)?;
        tracing::warn!(
            %trace_id,
            conversation_id = %conversation_id,
            recipient = %recipient,
            "collaborator unreachable, answering with emergency reply"
        );
        Some(
            self.reply_to_pending(recipient, EMERGENCY_REPLY.to_string())
                .await,
        )
    }

    async fn reply_to_pending(&self, recipient: String, text: String) -> OutboundMessage {
        let outbound = OutboundMessage {
            trace_id: Uuid::new_v4(),
            channel_type: MAILBOX_CHANNEL.into(),
            recipient,
            text,
            at: Utc::now(),
            reply_to: None,
        };
        let _ = self
            .bus
            .publish(BusMessage::ReplyReady {
                outbound: outbound.clone(),
            })
            .await;
        outbound
    }

    pub async fn handle_acknowledgement(&self, sender: &str, ack: &ChatAcknowledgement) {
        tracing::debug!(
            sender,
            acknowledged_msg_id = %ack.acknowledged_msg_id,
            "acknowledgement received"
        );
        let _ = self
            .bus
            .publish(BusMessage::AcknowledgementReceived {
                sender: sender.to_string(),
                acknowledged_msg_id: ack.acknowledged_msg_id,
            })
            .await;
    }
}

/// Prompt asking the collaborator to echo `conversation_id` next to its answer.
pub fn collaborator_prompt(conversation_id: &ConversationId, text: &str) -> StructuredOutputPrompt {
    StructuredOutputPrompt {
        prompt: text.to_string(),
        output_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "conversation_id": { "type": "string", "const": conversation_id.0 },
                "response": { "type": "string" }
            },
            "required": ["conversation_id", "response"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use intentfi_bus::{EventBus, Topic};
    use intentfi_core::format::SEASON_HINT;
    use intentfi_core::{FallbackResponder, LlmConfig, StatsResponder};
    use intentfi_provider::{LlmProvider, LlmRequest, LlmResponse, StubProvider};
    use intentfi_stats::StatsClient;
    use tokio::sync::mpsc::Receiver;

    use super::*;

    struct PanickingProvider;

    #[async_trait]
    impl LlmProvider for PanickingProvider {
        async fn chat(&self, _request: LlmRequest) -> Result<LlmResponse> {
            panic!("provider blew up");
        }
    }

    fn make_responder(provider: Arc<dyn LlmProvider>) -> Responder {
        Responder::new(
            StatsResponder::new(StatsClient::new("http://127.0.0.1:1")),
            FallbackResponder::new(provider, &LlmConfig::default()),
        )
    }

    fn make_gateway(
        bus: &EventBus,
        provider: Arc<dyn LlmProvider>,
        collaborator: Option<&str>,
    ) -> (Gateway, Arc<PendingConversations>) {
        let pending = Arc::new(PendingConversations::new(16, Duration::from_secs(60)));
        let gateway = Gateway::new(
            make_responder(provider),
            bus.publisher(),
            pending.clone(),
            collaborator.map(str::to_string),
        );
        (gateway, pending)
    }

    async fn next_event(rx: &mut Receiver<BusMessage>) -> BusMessage {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn unmatched_message_uses_local_fallback() {
        let bus = EventBus::new(16);
        let mut accepted_rx = bus.subscribe(Topic::MessageAccepted).await;
        let mut reply_rx = bus.subscribe(Topic::ReplyReady).await;
        let (gw, _) = make_gateway(&bus, Arc::new(StubProvider), None);

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "bonjour");
        let trace_id = inbound.trace_id;
        let dispatch = gw.handle_inbound(inbound).await;

        assert_eq!(dispatch.reply_text(), Some("[stub:gpt-3.5-turbo] bonjour"));
        assert!(matches!(
            next_event(&mut accepted_rx).await,
            BusMessage::MessageAccepted { trace_id: t } if t == trace_id
        ));
        match next_event(&mut reply_rx).await {
            BusMessage::ReplyReady { outbound } => {
                assert_eq!(outbound.recipient, "agent1quser");
                assert_eq!(outbound.trace_id, trace_id);
            }
            other => panic!("expected ReplyReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn matched_intent_is_answered_directly_even_with_collaborator() {
        let bus = EventBus::new(16);
        let (gw, pending) =
            make_gateway(&bus, Arc::new(StubProvider), Some("agent1qcollab"));

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "prochains matchs de la saison");
        let dispatch = gw.handle_inbound(inbound).await;

        assert_eq!(dispatch.reply_text(), Some(SEASON_HINT));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn unmatched_message_is_forwarded_to_collaborator() {
        let bus = EventBus::new(16);
        let mut forwarded_rx = bus.subscribe(Topic::PromptForwarded).await;
        let (gw, pending) =
            make_gateway(&bus, Arc::new(StubProvider), Some("agent1qcollab"));

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "parle-moi du bitcoin");
        let Dispatch::Forwarded(conversation_id) = gw.handle_inbound(inbound).await else {
            panic!("expected a forwarded dispatch");
        };
        assert_eq!(pending.len(), 1);

        match next_event(&mut forwarded_rx).await {
            BusMessage::PromptForwarded {
                conversation_id: id,
                recipient,
                prompt,
                ..
            } => {
                assert_eq!(id, conversation_id);
                assert_eq!(recipient, "agent1qcollab");
                assert_eq!(prompt.prompt, "parle-moi du bitcoin");
                assert_eq!(
                    prompt.output_schema["properties"]["conversation_id"]["const"],
                    conversation_id.0
                );
            }
            other => panic!("expected PromptForwarded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn structured_response_returns_to_original_sender_once() {
        let bus = EventBus::new(16);
        let (gw, pending) =
            make_gateway(&bus, Arc::new(StubProvider), Some("agent1qcollab"));

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "parle-moi du bitcoin");
        let Dispatch::Forwarded(conversation_id) = gw.handle_inbound(inbound).await else {
            panic!("expected a forwarded dispatch");
        };

        let response = StructuredOutputResponse {
            output: serde_json::json!({
                "conversation_id": conversation_id.0,
                "response": "Le bitcoin est volatil."
            }),
        };
        let outbound = gw
            .handle_structured_response("agent1qcollab", &response)
            .await
            .unwrap();
        assert_eq!(outbound.recipient, "agent1quser");
        assert_eq!(outbound.text, "Le bitcoin est volatil.");
        assert!(pending.is_empty());

        assert!(gw
            .handle_structured_response("agent1qcollab", &response)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn structured_response_without_text_is_unreadable() {
        let bus = EventBus::new(16);
        let (gw, pending) = make_gateway(&bus, Arc::new(StubProvider), None);
        let id = ConversationId("c-1".into());
        pending.insert(id.clone(), "agent1quser");

        let response = StructuredOutputResponse {
            output: serde_json::json!({ "conversation_id": "c-1" }),
        };
        let outbound = gw
            .handle_structured_response("agent1qcollab", &response)
            .await
            .unwrap();
        assert_eq!(outbound.text, UNREADABLE_COLLABORATOR_REPLY);
    }

    #[tokio::test]
    async fn structured_response_for_unknown_conversation_is_dropped() {
        let bus = EventBus::new(16);
        let mut reply_rx = bus.subscribe(Topic::ReplyReady).await;
        let (gw, _) = make_gateway(&bus, Arc::new(StubProvider), None);

        let response = StructuredOutputResponse {
            output: serde_json::json!({ "conversation_id": "missing", "response": "x" }),
        };
        assert!(gw
            .handle_structured_response("agent1qcollab", &response)
            .await
            .is_none());
        assert!(reply_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn undeliverable_prompt_answers_user_once_with_emergency_text() {
        let bus = EventBus::new(16);
        let (gw, pending) =
            make_gateway(&bus, Arc::new(StubProvider), Some("agent1qcollab"));

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "parle-moi du bitcoin");
        let trace_id = inbound.trace_id;
        let Dispatch::Forwarded(conversation_id) = gw.handle_inbound(inbound).await else {
            panic!("expected a forwarded dispatch");
        };

        let mut reply_rx = bus.subscribe(Topic::ReplyReady).await;
        let outbound = gw
            .handle_forward_failure(trace_id, &conversation_id)
            .await
            .unwrap();
        assert_eq!(outbound.recipient, "agent1quser");
        assert_eq!(outbound.text, EMERGENCY_REPLY);
        assert!(pending.is_empty());
        assert!(matches!(
            next_event(&mut reply_rx).await,
            BusMessage::ReplyReady { outbound } if outbound.text == EMERGENCY_REPLY
        ));

        assert!(gw
            .handle_forward_failure(trace_id, &conversation_id)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn crashed_handler_sends_emergency_reply() {
        let bus = EventBus::new(16);
        let mut failed_rx = bus.subscribe(Topic::TaskFailed).await;
        let (gw, _) = make_gateway(&bus, Arc::new(PanickingProvider), None);

        let inbound = InboundMessage::new(MAILBOX_CHANNEL, "agent1quser", "bonjour");
        let trace_id = inbound.trace_id;
        let dispatch = gw.handle_inbound(inbound).await;

        assert_eq!(dispatch.reply_text(), Some(EMERGENCY_REPLY));
        assert!(matches!(
            next_event(&mut failed_rx).await,
            BusMessage::TaskFailed { trace_id: t, .. } if t == trace_id
        ));
    }

    #[tokio::test]
    async fn acknowledgement_is_published() {
        let bus = EventBus::new(16);
        let mut ack_rx = bus.subscribe(Topic::AcknowledgementReceived).await;
        let (gw, _) = make_gateway(&bus, Arc::new(StubProvider), None);

        let ack = ChatAcknowledgement::for_message(Uuid::nil());
        gw.handle_acknowledgement("agent1qpeer", &ack).await;

        match next_event(&mut ack_rx).await {
            BusMessage::AcknowledgementReceived {
                sender,
                acknowledged_msg_id,
            } => {
                assert_eq!(sender, "agent1qpeer");
                assert_eq!(acknowledged_msg_id, Uuid::nil());
            }
            other => panic!("expected AcknowledgementReceived, got {other:?}"),
        }
    }
}
