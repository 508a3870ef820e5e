// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! HTTP contract tests for the provider client: retry counting, error
//! classification, dialect bodies, and streaming frames.

use parlor::client::AiClient;
use parlor::engine::ChatEngine;
use parlor::registry::{Model, ModelDraft, Provider, ProviderDraft, ProviderKind, Registry};
use parlor::session::{ChatMessage, Role};
use parlor::{ApiError, ParlorError};

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opt-in log output for debugging: `RUST_LOG=parlor=debug cargo test`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn provider_at(uri: &str, kind: ProviderKind) -> Provider {
    Provider {
        id: uuid::Uuid::new_v4(),
        name: "Test Provider".to_string(),
        base_url: uri.to_string(),
        api_key: "sk-test".to_string(),
        enabled: true,
        kind,
    }
}

fn model_for(provider: &Provider) -> Model {
    Model {
        id: uuid::Uuid::new_v4(),
        name: "Test Model".to_string(),
        provider_id: provider.id,
        model_identifier: "test-model-1".to_string(),
        is_default: true,
    }
}

fn openai_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    })
}

// ===== Retry policy =====

#[tokio::test]
async fn test_two_503s_then_200_makes_exactly_three_attempts() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let reply = client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap();
    assert_eq!(reply, "recovered");
}

#[tokio::test]
async fn test_401_is_not_retried_and_classified_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let err = client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap_err();
    match err {
        ParlorError::Api(ApiError::Auth { status }) => assert_eq!(status, 401),
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn test_429_is_not_retried_and_captures_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let err = client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap_err();
    match err {
        ParlorError::Api(ApiError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(7));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exhausted_retries_rethrow_last_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({"error": {"message": "still broken"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let err = client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap_err();
    match err {
        ParlorError::Api(ApiError::Server { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "still broken");
        }
        other => panic!("expected Server, got {other:?}"),
    }
}

// ===== Wire contract =====

#[tokio::test]
async fn test_bearer_auth_and_endpoint_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::Custom);
    let model = model_for(&provider);
    let client = AiClient::new();

    client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_openai_dialect_body_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("ok")))
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();
    client
        .complete(
            &provider,
            &model,
            &[ChatMessage::user("hi")],
            "context block",
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();

    assert_eq!(body["model"], "test-model-1");
    assert_eq!(body["stream"], false);
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["max_tokens"], 2000);
    // Context block rides as one synthetic leading system message
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "context block");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "hi");
}

#[tokio::test]
async fn test_anthropic_dialect_body_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "claude says hi"}]
        })))
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::Anthropic);
    let model = model_for(&provider);
    let client = AiClient::new();
    let history = vec![
        ChatMessage::user("hi"),
        ChatMessage::assistant("hello", None),
    ];

    let reply = client
        .complete(&provider, &model, &history, "context block")
        .await
        .unwrap();
    assert_eq!(reply, "claude says hi");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();

    // System content is a top-level string, not a message
    assert_eq!(body["system"], "context block");
    assert_eq!(body["max_tokens"], 2000);
    assert!(body.get("temperature").is_none());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_unknown_response_shape_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "what"})),
        )
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let err = client
        .complete(&provider, &model, &[ChatMessage::user("hi")], "")
        .await
        .unwrap_err();
    assert!(matches!(err, ParlorError::Api(ApiError::Unknown(_))));
}

// ===== Streaming =====

#[tokio::test]
async fn test_streaming_chunks_in_order_until_done() {
    let server = MockServer::start().await;
    let frames = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(frames, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let mut chunks = Vec::new();
    let full = client
        .stream_with(&provider, &model, &[ChatMessage::user("hi")], "", |c| {
            chunks.push(c.to_string())
        })
        .await
        .unwrap();

    // Exactly the two pre-[DONE] chunks, in arrival order
    assert_eq!(chunks, vec!["Hel", "lo"]);
    assert_eq!(full, "Hello");

    // The streaming request flags stream: true
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn test_streaming_flushes_trailing_frame_without_newline() {
    let server = MockServer::start().await;
    // The upstream closed without a trailing newline or [DONE]
    let frames = concat!(
        "data: {\"delta\":{\"text\":\"first\"}}\n\n",
        "data: {\"delta\":{\"text\":\" last\"}}",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(frames, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::Anthropic);
    let model = model_for(&provider);
    let client = AiClient::new();

    let mut chunks = Vec::new();
    let full = client
        .stream_with(&provider, &model, &[ChatMessage::user("hi")], "", |c| {
            chunks.push(c.to_string())
        })
        .await
        .unwrap();

    assert_eq!(chunks, vec!["first", " last"]);
    assert_eq!(full, "first last");
}

#[tokio::test]
async fn test_streaming_skips_malformed_frames() {
    let server = MockServer::start().await;
    let frames = concat!(
        "data: {broken json\n\n",
        "event: noise\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"kept\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(frames, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let mut chunks = Vec::new();
    client
        .stream_with(&provider, &model, &[ChatMessage::user("hi")], "", |c| {
            chunks.push(c.to_string())
        })
        .await
        .unwrap();
    assert_eq!(chunks, vec!["kept"]);
}

#[tokio::test]
async fn test_streaming_auth_failure_before_stream_opens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_at(&server.uri(), ProviderKind::OpenAi);
    let model = model_for(&provider);
    let client = AiClient::new();

    let err = client
        .stream_with(&provider, &model, &[ChatMessage::user("hi")], "", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParlorError::Api(ApiError::Auth { status: 403 })
    ));
}

// ===== Engine send flow =====

fn engine_against(server_uri: &str, kind: ProviderKind) -> ChatEngine {
    let mut registry = Registry::new();
    let provider = registry
        .add_provider(ProviderDraft::new("Mock", server_uri, "sk-test", kind))
        .unwrap();
    let model = registry
        .add_model(ModelDraft::new("Mock Model", provider.id, "test-model-1"))
        .unwrap();
    registry.set_default_model(model.id);
    ChatEngine::from_parts(registry, Default::default(), AiClient::new())
}

#[tokio::test]
async fn test_engine_records_user_then_assistant() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("sure thing")))
        .mount(&server)
        .await;

    let mut engine = engine_against(&server.uri(), ProviderKind::OpenAi);
    let reply = engine.send_message("help me").await.unwrap();
    assert_eq!(reply.content, "sure thing");
    assert_eq!(reply.role, Role::Assistant);
    assert!(reply.model_id.is_some());

    let session_id = engine.sessions().current_session_id().unwrap();
    let messages = engine.sessions().get_messages(session_id);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "help me");
    assert_eq!(messages[1].id, reply.id);
}

#[tokio::test]
async fn test_engine_streaming_send_accumulates_reply() {
    let server = MockServer::start().await;
    let frames = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"str\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"eamed\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(frames, "text/event-stream"))
        .mount(&server)
        .await;

    let mut engine = engine_against(&server.uri(), ProviderKind::OpenAi);
    let mut chunks = Vec::new();
    let reply = engine
        .send_message_streaming("go", |c| chunks.push(c.to_string()))
        .await
        .unwrap();

    assert_eq!(chunks, vec!["str", "eamed"]);
    assert_eq!(reply.content, "streamed");

    let session_id = engine.sessions().current_session_id().unwrap();
    assert_eq!(engine.sessions().get_messages(session_id).len(), 2);
}

#[tokio::test]
async fn test_engine_keeps_user_message_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut engine = engine_against(&server.uri(), ProviderKind::OpenAi);
    let err = engine.send_message("doomed").await.unwrap_err();
    assert!(matches!(err, ParlorError::Api(ApiError::Auth { .. })));

    // No rollback: the user message stays even though the reply failed
    let session_id = engine.sessions().current_session_id().unwrap();
    let messages = engine.sessions().get_messages(session_id);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "doomed");
}

#[tokio::test]
async fn test_engine_injects_live_selection_into_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("ok")))
        .mount(&server)
        .await;

    let mut engine = engine_against(&server.uri(), ProviderKind::OpenAi);
    engine
        .live_selection_mut()
        .set_selection("let x = 1;", Some("src/main.rs"));
    engine.send_message("explain this").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let first = &body["messages"][0];
    assert_eq!(first["role"], "system");
    let content = first["content"].as_str().unwrap();
    assert!(content.contains("[Live Selection (from src/main.rs)]"));
    assert!(content.contains("let x = 1;"));
}
