use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use intentfi_bus::{EventBus, Topic};
use intentfi_core::format::EMERGENCY_REPLY;
use intentfi_gateway::Gateway;
use intentfi_schema::{
    AgentMessage, BusMessage, ChatMessage, Envelope, OutboundMessage, StructuredOutputPrompt,
};
use tokio::task::JoinHandle;

pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Posts envelopes signed with this agent's address to peer mailboxes.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    address: String,
    timeout: Duration,
}

impl DeliveryClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_timeout(address, DEFAULT_DELIVERY_TIMEOUT_SECS)
    }

    pub fn with_timeout(address: impl Into<String>, timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "delivery http client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            http,
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn send(&self, recipient: &str, message: AgentMessage) -> Result<()> {
        let envelope = Envelope {
            sender: self.address.clone(),
            message,
        };
        let resp = self
            .http
            .post(recipient)
            .timeout(self.timeout)
            .json(&envelope)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("delivery to {recipient} failed ({status})"));
        }
        Ok(())
    }

    /// Sends a reply as a chat message. One retry, carrying the emergency
    /// text instead of the original reply.
    pub async fn deliver_reply(&self, outbound: &OutboundMessage) -> Result<()> {
        let chat = ChatMessage::text(outbound.text.clone());
        match self.send(&outbound.recipient, AgentMessage::Chat(chat)).await {
            Ok(()) => {
                tracing::info!(
                    trace_id = %outbound.trace_id,
                    recipient = %outbound.recipient,
                    "reply delivered"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    trace_id = %outbound.trace_id,
                    recipient = %outbound.recipient,
                    error = %err,
                    "reply delivery failed, sending emergency reply"
                );
                let emergency = ChatMessage::text(EMERGENCY_REPLY);
                self.send(&outbound.recipient, AgentMessage::Chat(emergency))
                    .await
            }
        }
    }

    pub async fn deliver_prompt(
        &self,
        recipient: &str,
        prompt: StructuredOutputPrompt,
    ) -> Result<()> {
        self.send(recipient, AgentMessage::StructuredPrompt(prompt))
            .await
    }
}

/// Subscribes to outgoing traffic on `bus` and delivers each message on its
/// own task. A prompt the collaborator never receives is answered through
/// `gateway` so the waiting user still gets a reply.
pub async fn spawn_delivery_listener(
    bus: &EventBus,
    client: DeliveryClient,
    gateway: Arc<Gateway>,
) -> JoinHandle<()> {
    let mut replies = bus.subscribe(Topic::ReplyReady).await;
    let mut prompts = bus.subscribe(Topic::PromptForwarded).await;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = replies.recv() => {
                    let BusMessage::ReplyReady { outbound } = msg else {
                        continue;
                    };
                    let client = client.clone();
                    tokio::spawn(async move {
                        if let Err(err) = client.deliver_reply(&outbound).await {
                            tracing::error!(
                                trace_id = %outbound.trace_id,
                                recipient = %outbound.recipient,
                                error = %err,
                                "reply could not be delivered"
                            );
                        }
                    });
                }
                Some(msg) = prompts.recv() => {
                    let BusMessage::PromptForwarded {
                        trace_id,
                        conversation_id,
                        recipient,
                        prompt,
                    } = msg
                    else {
                        continue;
                    };
                    let client = client.clone();
                    let gateway = gateway.clone();
                    tokio::spawn(async move {
                        if let Err(err) = client.deliver_prompt(&recipient, prompt).await {
                            tracing::error!(
                                %trace_id,
                                %conversation_id,
                                recipient = %recipient,
                                error = %err,
                                "prompt could not be forwarded"
                            );
                            gateway
                                .handle_forward_failure(trace_id, &conversation_id)
                                .await;
                        }
                    });
                }
                else => break,
            }
        }
    })
}
