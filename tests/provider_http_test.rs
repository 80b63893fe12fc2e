//! HTTP-level tests for the Ollama and OpenAI-compatible providers

use futures::StreamExt;
use serde_json::json;
use serial_test::serial;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use threadchat::config::{OllamaConfig, OpenAiConfig};
use threadchat::engine::{ConversationEngine, ReplyEvent};
use threadchat::providers::{Message, OllamaProvider, OpenAiProvider, Provider};
use threadchat::storage::ThreadId;

mod common;

fn ollama_with_timeout(server: &MockServer, timeout_seconds: u64) -> OllamaProvider {
    let cfg = OllamaConfig {
        host: server.uri(),
        model: "llama3.2:latest".to_string(),
    };
    OllamaProvider::new(cfg, timeout_seconds).unwrap()
}

fn ollama_for(server: &MockServer) -> OllamaProvider {
    ollama_with_timeout(server, 5)
}

fn openai_with_timeout(
    server: &MockServer,
    api_key_env: &str,
    timeout_seconds: u64,
) -> OpenAiProvider {
    let cfg = OpenAiConfig {
        api_base: format!("{}/v1", server.uri()),
        model: "gemini-2.0-flash".to_string(),
        api_key_env: api_key_env.to_string(),
    };
    OpenAiProvider::new(cfg, timeout_seconds).unwrap()
}

fn openai_for(server: &MockServer, api_key_env: &str) -> OpenAiProvider {
    openai_with_timeout(server, api_key_env, 5)
}

#[tokio::test]
async fn test_ollama_complete() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2:latest", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:latest",
            "message": {"role": "assistant", "content": "Hi there"},
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ollama_for(&server);
    let response = provider.complete(&[Message::user("Hello")]).await.unwrap();
    assert_eq!(response.message, Message::assistant("Hi there"));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(15));
}

#[tokio::test]
async fn test_ollama_stream_ndjson() {
    let server = MockServer::start().await;
    let body = [
        r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":2}"#,
    ]
    .join("\n");

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let provider = ollama_for(&server);
    let fragments: Vec<String> = provider
        .complete_stream(&[Message::user("Hi")])
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
}

#[tokio::test]
async fn test_ollama_error_status_is_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let err = ollama_for(&server)
        .complete(&[Message::user("Hi")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn test_ollama_stream_times_out_waiting_for_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"message":{"role":"assistant","content":"late"},"done":true}"#)
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = ollama_with_timeout(&server, 1)
        .complete_stream(&[Message::user("Hi")])
        .await;

    let err = match result {
        Ok(_) => panic!("stalled stream should time out"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
#[serial]
async fn test_openai_complete_sends_bearer_key() {
    let server = MockServer::start().await;
    std::env::set_var("THREADCHAT_TEST_API_KEY", "secret-key");

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Bonjour"}}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = openai_for(&server, "THREADCHAT_TEST_API_KEY")
        .complete(&[Message::user("Hello in French")])
        .await;
    std::env::remove_var("THREADCHAT_TEST_API_KEY");

    let response = result.unwrap();
    assert_eq!(response.message.content, "Bonjour");
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(5));
}

#[tokio::test]
#[serial]
async fn test_openai_missing_key_fails_before_request() {
    let server = MockServer::start().await;
    std::env::remove_var("THREADCHAT_TEST_MISSING_KEY");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = openai_for(&server, "THREADCHAT_TEST_MISSING_KEY")
        .complete(&[Message::user("Hi")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("THREADCHAT_TEST_MISSING_KEY"));
}

#[tokio::test]
async fn test_openai_stream_sse() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Once \"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"upon\"}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ignored\"}}]}\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let provider = openai_for(&server, "");
    let text: String = provider
        .complete_stream(&[Message::user("Tell me a story")])
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat();
    assert_eq!(text, "Once upon");
}

#[tokio::test]
async fn test_openai_stream_times_out_waiting_for_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string("data: [DONE]\n\n")
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = openai_with_timeout(&server, "", 1)
        .complete_stream(&[Message::user("Hi")])
        .await;

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_engine_streams_and_persists_through_ollama() {
    let server = MockServer::start().await;
    let body = [
        r#"{"message":{"role":"assistant","content":"Par"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"is"},"done":true}"#,
    ]
    .join("\n");

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(Box::new(ollama_for(&server)), storage.clone());
    let id = ThreadId::generate();

    let mut stream = engine
        .send_stream(&id, "Capital of France?")
        .await
        .unwrap();
    let mut deltas = String::new();
    let done = loop {
        match stream.next_event().await.unwrap() {
            Some(ReplyEvent::Delta(d)) => deltas.push_str(&d),
            Some(ReplyEvent::Done(message)) => break message,
            None => panic!("stream ended without completion"),
        }
    };

    assert_eq!(deltas, "Paris");
    assert_eq!(done, Message::assistant("Paris"));
    assert_eq!(
        storage.load_messages(&id, None).unwrap(),
        vec![
            Message::user("Capital of France?"),
            Message::assistant("Paris")
        ]
    );
}
