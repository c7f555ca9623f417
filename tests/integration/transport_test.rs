//! Anthropic transport against a mock server.
//!
//! Verifies SSE parsing into stream events and that every response ends
//! with exactly one terminal event, whatever goes wrong.

use secrecy::SecretString;
use tangent::api::{AnthropicTransport, ModelTransport};
use tangent::tree::TreeStore;
use tangent::types::config::Config;
use tangent::types::{MessageNode, NewMessage, StreamEvent};
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEXT_STREAM: &str = r#"event: message_start
data: {"type":"message_start","message":{"id":"msg_123","type":"message","role":"assistant","content":[]}}

event: content_block_start
data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}

event: ping
data: {"type":"ping"}

event: content_block_delta
data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}

event: content_block_delta
data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":", world!"}}

event: content_block_stop
data: {"type":"content_block_stop","index":0}

event: message_stop
data: {"type":"message_stop"}

"#;

fn request() -> Vec<MessageNode> {
    let mut store = TreeStore::new();
    store.add_message(NewMessage::system("Be brief."), None).unwrap();
    store.add_message(NewMessage::user("Hello"), None).unwrap().path
}

fn transport(server: &MockServer, model: &str) -> AnthropicTransport {
    let config = Config {
        model: model.to_string(),
        ..Config::default()
    };
    AnthropicTransport::new(SecretString::from("test-key-value"), &config).with_base_url(server.uri())
}

async fn collect(transport: &AnthropicTransport) -> Vec<StreamEvent> {
    let (tx, mut rx) = mpsc::channel(100);
    transport.stream(request(), tx).await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

async fn mount_sse(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.to_string(), "text/event-stream")
                .append_header("content-type", "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_text_deltas_become_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key-value"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "stream": true,
            "system": "Be brief.",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "Hello"}]}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(TEXT_STREAM, "text/event-stream")
                .append_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&transport(&server, "claude-3-5-haiku-20241022")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Chunk("Hello".into()),
            StreamEvent::Chunk(", world!".into()),
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_reasoning_model_streams_thinking() {
    let server = MockServer::start().await;
    let body = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Short "}}

data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"answer."}}

data: {"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"abc"}}

data: {"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Hi."}}

data: {"type":"message_stop"}

"#;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({
            "thinking": {"type": "enabled", "budget_tokens": 4096}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&transport(&server, "claude-opus-4-20250514")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ThinkingChunk("Short ".into()),
            StreamEvent::ThinkingChunk("answer.".into()),
            StreamEvent::Chunk("Hi.".into()),
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_http_error_is_single_error_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let events = collect(&transport(&server, "claude-3-5-haiku-20241022")).await;

    assert_eq!(events.len(), 1);
    let StreamEvent::Error(message) = &events[0] else {
        panic!("expected error event, got {:?}", events[0]);
    };
    assert!(message.contains("500"), "message was {}", message);
}

#[tokio::test]
async fn test_sse_error_event_ends_stream() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Par"}}

data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}

data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ignored"}}

"#,
    )
    .await;

    let events = collect(&transport(&server, "claude-3-5-haiku-20241022")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Chunk("Par".into()),
            StreamEvent::Error("Overloaded".into()),
        ]
    );
}

#[tokio::test]
async fn test_truncated_stream_reports_error() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Half"}}

"#,
    )
    .await;

    let events = collect(&transport(&server, "claude-3-5-haiku-20241022")).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::Chunk("Half".into()));
    assert!(events[1].is_error());
    assert!(events.iter().filter(|e| e.is_terminal()).count() == 1);
}

#[tokio::test]
async fn test_unreachable_server_is_error_event() {
    let server = MockServer::start().await;
    let transport = transport(&server, "claude-3-5-haiku-20241022");
    drop(server);

    let events = collect(&transport).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());
}
