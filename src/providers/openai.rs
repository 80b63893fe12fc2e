//! OpenAI-compatible provider implementation for Threadchat
//!
//! Talks to any server exposing the `/chat/completions` API. The default
//! configuration targets Gemini through Google's compatibility endpoint.
//! Streaming uses Server-Sent Events: each `data:` line holds a JSON chunk
//! and `data: [DONE]` ends the reply.

use crate::config::OpenAiConfig;
use crate::error::{Result, ThreadchatError};
use crate::providers::stream::{byte_lines, fragments, LineEvent};
use crate::providers::{CompletionResponse, Message, Provider, TextStream, TokenUsage};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    delta: Option<ChatDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Error body some servers send inside the event stream
#[derive(Debug, Deserialize)]
struct StreamError {
    error: StreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider
    ///
    /// The API key is not read here; it is looked up on each request so a
    /// provider can be built before credentials are exported.
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::config::OpenAiConfig;
    /// use threadchat::providers::OpenAiProvider;
    ///
    /// let provider = OpenAiProvider::new(OpenAiConfig::default(), 60);
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OpenAiConfig, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("threadchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ThreadchatError::RemoteModel(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized OpenAI-compatible provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> Result<Option<String>> {
        if self.config.api_key_env.is_empty() {
            return Ok(None);
        }
        match std::env::var(&self.config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ThreadchatError::MissingCredentials(format!(
                "openai (set {})",
                self.config.api_key_env
            ))
            .into()),
        }
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            stream,
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        tracing::debug!(
            "Sending chat completion request: {} messages, stream={}",
            request.messages.len(),
            request.stream
        );

        let mut builder = self.client.post(self.completions_url()).json(request);
        if let Some(key) = self.api_key()? {
            builder = builder.bearer_auth(key);
        }
        // Streamed bodies are unbounded in total; the wait for headers and
        // each gap between chunks are limited instead.
        let sent = if request.stream {
            tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| {
                    tracing::error!("Chat completion request timed out after {}s", self.timeout.as_secs());
                    ThreadchatError::RemoteModel(format!(
                        "Chat completion request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })?
        } else {
            builder.timeout(self.timeout).send().await
        };

        let response = sent.map_err(|e| {
            tracing::error!("Chat completion request failed: {}", e);
            ThreadchatError::RemoteModel(format!("Chat completion request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Chat completion returned error {}: {}", status, error_text);
            return Err(ThreadchatError::RemoteModel(format!(
                "Chat completion returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

/// Classify one line of an SSE reply
fn decode_sse_line(line: &str) -> Result<LineEvent> {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        // `event:`, `id:`, `retry:` and `:` comment lines carry no text
        None => return Ok(LineEvent::Skip),
    };

    if data == "[DONE]" {
        return Ok(LineEvent::Done(String::new()));
    }

    if let Ok(err) = serde_json::from_str::<StreamError>(data) {
        return Err(ThreadchatError::RemoteModel(format!(
            "Chat completion stream error: {}",
            err.error.message
        ))
        .into());
    }

    let chunk: ChatResponse = serde_json::from_str(data).map_err(|e| {
        ThreadchatError::RemoteModel(format!("Malformed chat completion chunk: {}", e))
    })?;

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .unwrap_or_default();

    Ok(LineEvent::Fragment(text))
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse> {
        let request = self.build_request(messages, false);
        let response = self.send(&request).await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse chat completion response: {}", e);
            ThreadchatError::RemoteModel(format!("Failed to parse chat completion: {}", e))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| {
                ThreadchatError::RemoteModel("Chat completion returned no choices".to_string())
            })?;

        let message = Message::assistant(content);
        Ok(match body.usage {
            Some(usage) => CompletionResponse::with_usage(
                message,
                TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            ),
            None => CompletionResponse::new(message),
        })
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let request = self.build_request(messages, true);
        let response = self.send(&request).await?;
        Ok(fragments(byte_lines(response.bytes_stream(), self.timeout), decode_sse_line))
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}
