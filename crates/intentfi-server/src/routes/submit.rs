use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use intentfi_gateway::MAILBOX_CHANNEL;
use intentfi_schema::{AgentMessage, ChatAcknowledgement, Envelope, InboundMessage};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/submit", post(submit))
}

/// Mailbox entry point. Chat messages are acknowledged right away and
/// answered asynchronously through the delivery listener.
async fn submit(State(state): State<AppState>, Json(envelope): Json<Envelope>) -> Response {
    let Envelope { sender, message } = envelope;

    match message {
        AgentMessage::Chat(chat) => {
            let inbound = InboundMessage::from_chat(MAILBOX_CHANNEL, sender.as_str(), &chat);
            tracing::info!(
                trace_id = %inbound.trace_id,
                sender = %sender,
                msg_id = %chat.msg_id,
                "chat message received"
            );

            let gateway = state.gateway.clone();
            tokio::spawn(async move {
                gateway.handle_inbound(inbound).await;
            });

            let ack = Envelope {
                sender: state.address.clone(),
                message: AgentMessage::Acknowledgement(ChatAcknowledgement::for_message(
                    chat.msg_id,
                )),
            };
            (StatusCode::OK, Json(ack)).into_response()
        }
        AgentMessage::Acknowledgement(ack) => {
            state.gateway.handle_acknowledgement(&sender, &ack).await;
            StatusCode::ACCEPTED.into_response()
        }
        AgentMessage::StructuredResponse(response) => {
            state
                .gateway
                .handle_structured_response(&sender, &response)
                .await;
            StatusCode::ACCEPTED.into_response()
        }
        AgentMessage::StructuredPrompt(_) => {
            tracing::warn!(sender = %sender, "structured prompts are not served by this agent");
            StatusCode::UNPROCESSABLE_ENTITY.into_response()
        }
    }
}
