//! End-to-end tests for the HTTP transport using wiremock.

use chatbot_core::{ChatMessage, ChatSession, GenerationSettings, TransportError, TurnOutcome, APOLOGY_TEXT};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str("data: ");
        body.push_str(&serde_json::json!({"choices": [{"delta": {"content": part}}]}).to_string());
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn posts_transcript_and_streams_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "messages": [{"role": "user", "content": "Hi there"}],
            "model": "gpt-4o-mini",
            "maxTokens": 512,
            "stream": true,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["Hel", "lo"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = GenerationSettings {
        model: "gpt-4o-mini".to_string(),
        max_tokens: 512,
        ..Default::default()
    };
    let session = ChatSession::http();
    let endpoint = format!("{}/api/chat", mock_server.uri());

    let outcome = session.submit("Hi there", &settings, &endpoint).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Completed { sentinel: true });
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1], ChatMessage::assistant("Hello"));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn server_error_yields_apology() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(sse_body(&["ignored"])))
        .mount(&mock_server)
        .await;

    let session = ChatSession::http();
    let outcome = session
        .submit("hi", &GenerationSettings::default(), &mock_server.uri())
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Failed(TransportError::Status(500)));
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1], ChatMessage::assistant(APOLOGY_TEXT));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    let session = ChatSession::http();

    let outcome = session
        .submit("hi", &GenerationSettings::default(), "http://127.0.0.1:1/chat")
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(TransportError::Request(_))));
    assert_eq!(session.transcript().last().unwrap().content, APOLOGY_TEXT);
}
