#![cfg(feature = "openai-compatible")]

mod common;

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use turnloop::backend::openai::OpenAiCompatibleBackend;
use turnloop::backend::{BackendRouter, ChatBackend, ChatRequest};
use turnloop::config::EngineConfig;
use turnloop::engine::{ChunkSink, TurnStatus};
use turnloop::error::TurnError;
use turnloop::persist::directive;
use turnloop::tools::InternalToolRegistry;
use turnloop::types::*;

fn sse(events: &[serde_json::Value]) -> String {
    let mut body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn request(model: &str) -> ChatRequest {
    ChatRequest {
        model: ModelRef::new("openai", model),
        messages: vec![ChatMessage::user("hi")],
        system_prompt: Some("Be brief.".into()),
        params: GenerationParams::builder().temperature(0.5).build(),
        tools: None,
        context: None,
    }
}

#[tokio::test]
async fn streams_chunks_from_sse_body() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices":[{"index":0,"delta":{"content":"Hi"}}]}),
        json!({"choices":[{"index":0,"delta":{"reasoning":"hmm"}}]}),
        json!({"choices":[{"index":0,"delta":{"content":" there"},"finish_reason":"stop"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "stream": true,
            "temperature": 0.5,
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new("openai", Some("test-key".into()), server.uri());
    let chunks: Vec<ChatChunk> = backend
        .stream_chat(&request("openai:gpt-test"))
        .await
        .expect("stream should open")
        .map(|item| item.expect("chunk"))
        .collect()
        .await;

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content_text(), Some("Hi"));
    assert_eq!(chunks[1].first().unwrap().delta.reasoning.as_deref(), Some("hmm"));
    assert_eq!(chunks[2].finish_reason(), Some(FinishReason::Stop));
}

#[tokio::test]
async fn error_status_fails_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "rate limited"}})),
        )
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new("openai", None, server.uri());
    let err = match backend.stream_chat(&request("gpt-test")).await {
        Ok(_) => panic!("expected an error status"),
        Err(err) => err,
    };

    assert!(matches!(err, TurnError::Backend { status: 429, .. }));
    assert!(err.is_transient());
    assert_eq!(err.to_string(), "Backend error (status 429): rate limited");
}

#[tokio::test]
async fn router_rejects_unknown_provider() {
    let router = BackendRouter::new();
    let mut req = request("gpt-test");
    req.model = ModelRef::new("nowhere", "gpt-test");
    let err = match router.stream_chat(&req).await {
        Ok(_) => panic!("expected a configuration error"),
        Err(err) => err,
    };
    assert!(matches!(err, TurnError::Configuration(_)));
}

#[tokio::test]
async fn full_turn_over_http_runs_tool_and_continues() {
    let server = MockServer::start().await;

    let tool_round = sse(&[
        json!({"choices":[{"index":0,"delta":{"tool_calls":[
            {"index":0,"id":"call_1","function":{"name":"search","arguments":""}}
        ]}}]}),
        json!({"choices":[{"index":0,"delta":{"tool_calls":[
            {"index":0,"function":{"arguments":"{\"q\":"}}
        ]}}]}),
        json!({"choices":[{"index":0,"delta":{"tool_calls":[
            {"index":0,"function":{"arguments":"\"cat\"}"}}
        ]}}]}),
        json!({"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}),
    ]);
    let answer = sse(&[
        json!({"choices":[{"index":0,"delta":{"content":"One cat."},"finish_reason":"stop"}]}),
    ]);

    // The continuation request carries the tool result in the history.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains("tool_call"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(answer, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "search"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(tool_round, "text/event-stream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let config = EngineConfig::new();
    config.set_base_url("openai", server.uri());
    config.set_api_key("openai", "test-key".into());
    let router = BackendRouter::from_config(&config);

    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut registry = InternalToolRegistry::new();
    registry.register(Arc::new(recording_tool("search", &log, json!({"hits": 1}))));
    let h = Harness::new(Arc::new(router), registry).await;

    let (sink, client) = ChunkSink::channel();
    let outcome = h.controller.run_turn(h.request("find cats"), sink).await.unwrap();
    let chunks = drain(client).await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.continuations, 1);
    assert_eq!(*log.lock().unwrap(), vec![("search".to_string(), json!({"q": "cat"}))]);

    let content = h.assistant_text().await;
    assert!(directive::contains_directive(&content));
    assert!(content.ends_with("One cat."));
    assert!(client_text(&chunks).ends_with("One cat."));
}
