use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback text used when an inbound chat message carries no text content.
pub const EMPTY_CHAT_FALLBACK_TEXT: &str = "hello";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    /// Address the reply is sent back to
    pub sender: String,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Protocol-level message ID, acknowledged on receipt
    #[serde(default)]
    pub message_id: Option<String>,
}

impl InboundMessage {
    pub fn new(
        channel_type: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            channel_type: channel_type.into(),
            sender: sender.into(),
            text: text.into(),
            at: Utc::now(),
            message_id: None,
        }
    }

    /// Builds an inbound message from a chat protocol message.
    pub fn from_chat(channel_type: impl Into<String>, sender: impl Into<String>, chat: &ChatMessage) -> Self {
        let text = chat
            .first_text()
            .map(str::to_string)
            .unwrap_or_else(|| EMPTY_CHAT_FALLBACK_TEXT.to_string());
        Self {
            trace_id: Uuid::new_v4(),
            channel_type: channel_type.into(),
            sender: sender.into(),
            text,
            at: chat.timestamp,
            message_id: Some(chat.msg_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub recipient: String,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Message this one answers
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn reply(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            trace_id: inbound.trace_id,
            channel_type: inbound.channel_type.clone(),
            recipient: inbound.sender.clone(),
            text: text.into(),
            at: Utc::now(),
            reply_to: inbound.message_id.clone(),
        }
    }
}

// ============================================================
// Agent chat protocol
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContent {
    Text {
        text: String,
    },
    StartSession,
    EndSession,
    /// Content kinds this agent does not interpret
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub msg_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub content: Vec<ChatContent>,
}

impl ChatMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            msg_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content: vec![ChatContent::Text { text: text.into() }],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ChatContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAcknowledgement {
    pub acknowledged_msg_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ChatAcknowledgement {
    pub fn for_message(msg_id: Uuid) -> Self {
        Self {
            acknowledged_msg_id: msg_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutputPrompt {
    pub prompt: String,
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutputResponse {
    pub output: serde_json::Value,
}

impl StructuredOutputResponse {
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.output
            .get("conversation_id")
            .and_then(|v| v.as_str())
            .map(|id| ConversationId(id.to_string()))
    }

    pub fn response_text(&self) -> Option<&str> {
        self.output.get("response").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentMessage {
    Chat(ChatMessage),
    Acknowledgement(ChatAcknowledgement),
    StructuredPrompt(StructuredOutputPrompt),
    StructuredResponse(StructuredOutputResponse),
}

/// Wire unit exchanged between agents: who sent it and what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub message: AgentMessage,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================
// Bus events
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    MessageAccepted {
        trace_id: Uuid,
    },
    ReplyReady {
        outbound: OutboundMessage,
    },
    PromptForwarded {
        trace_id: Uuid,
        conversation_id: ConversationId,
        recipient: String,
        prompt: StructuredOutputPrompt,
    },
    AcknowledgementReceived {
        sender: String,
        acknowledged_msg_id: Uuid,
    },
    TaskFailed {
        trace_id: Uuid,
        error: String,
    },
}
