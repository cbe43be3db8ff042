use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intentfi_bus::EventBus;
use intentfi_core::format::EMERGENCY_REPLY;
use intentfi_core::{FallbackResponder, LlmConfig, PendingConversations, Responder, StatsResponder};
use intentfi_gateway::{Dispatch, Gateway, MAILBOX_CHANNEL};
use intentfi_provider::StubProvider;
use intentfi_schema::{
    BusMessage, ConversationId, InboundMessage, OutboundMessage, StructuredOutputPrompt,
};
use intentfi_server::{spawn_delivery_listener, DeliveryClient};
use intentfi_stats::StatsClient;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "http://127.0.0.1:8000/submit";

fn outbound(server: &MockServer, text: &str) -> OutboundMessage {
    OutboundMessage {
        trace_id: Uuid::new_v4(),
        channel_type: "mailbox".into(),
        recipient: format!("{}/submit", server.uri()),
        text: text.into(),
        at: Utc::now(),
        reply_to: None,
    }
}

fn gateway(
    bus: &EventBus,
    collaborator: Option<String>,
) -> (Arc<Gateway>, Arc<PendingConversations>) {
    let pending = Arc::new(PendingConversations::new(16, Duration::from_secs(60)));
    let responder = Responder::new(
        StatsResponder::new(StatsClient::new("http://127.0.0.1:1")),
        FallbackResponder::new(Arc::new(StubProvider), &LlmConfig::default()),
    );
    let gateway = Gateway::new(responder, bus.publisher(), pending.clone(), collaborator);
    (Arc::new(gateway), pending)
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} requests to reach the mock mailbox");
}

#[tokio::test]
async fn reply_is_posted_as_chat_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_partial_json(serde_json::json!({
            "sender": ADDRESS,
            "message": { "kind": "chat" }
        })))
        .and(body_string_contains("Prochain match de PSG"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(ADDRESS);
    client
        .deliver_reply(&outbound(&server, "Prochain match de PSG: PSG vs Lens le 2025-08-17"))
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_reply_is_retried_once_with_emergency_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_string_contains("Erreur temporaire"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(ADDRESS);
    client
        .deliver_reply(&outbound(&server, "réponse normale"))
        .await
        .unwrap();
}

#[tokio::test]
async fn reply_delivery_gives_up_after_emergency_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(ADDRESS);
    let err = client
        .deliver_reply(&outbound(&server, "réponse normale"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn listener_delivers_bus_replies_and_prompts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_partial_json(serde_json::json!({ "message": { "kind": "chat" } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_partial_json(serde_json::json!({
            "message": { "kind": "structured_prompt", "prompt": "parle-moi du bitcoin" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let bus = EventBus::new(16);
    let (gw, _) = gateway(&bus, None);
    let _listener = spawn_delivery_listener(&bus, DeliveryClient::new(ADDRESS), gw).await;

    bus.publish(BusMessage::ReplyReady {
        outbound: outbound(&server, "bonjour"),
    })
    .await
    .unwrap();
    bus.publish(BusMessage::PromptForwarded {
        trace_id: Uuid::new_v4(),
        conversation_id: ConversationId("c-1".into()),
        recipient: format!("{}/submit", server.uri()),
        prompt: StructuredOutputPrompt {
            prompt: "parle-moi du bitcoin".into(),
            output_schema: serde_json::json!({ "type": "object" }),
        },
    })
    .await
    .unwrap();

    wait_for_requests(&server, 2).await;
}

#[tokio::test]
async fn slow_mailbox_hits_delivery_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = DeliveryClient::with_timeout(ADDRESS, 1);
    let started = std::time::Instant::now();
    let err = client
        .deliver_reply(&outbound(&server, "bonjour"))
        .await
        .unwrap_err();

    assert!(err
        .downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout()));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn unreachable_collaborator_gets_user_an_emergency_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collab/submit"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/submit"))
        .and(body_partial_json(serde_json::json!({ "message": { "kind": "chat" } })))
        .and(body_string_contains(EMERGENCY_REPLY))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let bus = EventBus::new(16);
    let (gw, pending) = gateway(&bus, Some(format!("{}/collab/submit", server.uri())));
    let _listener = spawn_delivery_listener(&bus, DeliveryClient::new(ADDRESS), gw.clone()).await;

    let inbound = InboundMessage::new(
        MAILBOX_CHANNEL,
        format!("{}/user/submit", server.uri()),
        "parle-moi du bitcoin",
    );
    assert!(matches!(gw.handle_inbound(inbound).await, Dispatch::Forwarded(_)));

    wait_for_requests(&server, 2).await;
    assert!(pending.is_empty());
}
