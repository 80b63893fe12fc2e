//! Ollama provider implementation for Threadchat
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server. Replies can be requested whole or streamed as
//! newline-delimited JSON.

use crate::config::OllamaConfig;
use crate::error::{Result, ThreadchatError};
use crate::providers::stream::{byte_lines, fragments, LineEvent};
use crate::providers::{CompletionResponse, Message, Provider, TextStream, TokenUsage};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use threadchat::config::OllamaConfig;
/// use threadchat::providers::{Message, OllamaProvider, Provider};
///
/// # async fn example() -> threadchat::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default(), 120)?;
/// let completion = provider.complete(&[Message::user("Hello!")]).await?;
/// println!("{}", completion.message.content);
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    timeout: Duration,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Response structure from Ollama API
///
/// Streaming responses send one of these per line; only the last one has
/// `done: true` and carries the token counts.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Arguments
    ///
    /// * `config` - Ollama configuration containing host and model
    /// * `timeout_seconds` - Limit for a whole non-streaming request, and for
    ///   the headers and each chunk gap of a streamed one
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::config::OllamaConfig;
    /// use threadchat::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(OllamaConfig::default(), 60);
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("threadchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ThreadchatError::RemoteModel(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config,
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: self.config.model.clone(),
            messages: convert_messages(messages),
            stream,
        }
    }

    async fn send(&self, request: &OllamaRequest) -> Result<reqwest::Response> {
        tracing::debug!(
            "Sending Ollama request: {} messages, stream={}",
            request.messages.len(),
            request.stream
        );

        let builder = self.client.post(self.chat_url()).json(request);
        // Streamed bodies are unbounded in total; the wait for headers and
        // each gap between chunks are limited instead.
        let sent = if request.stream {
            tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| {
                    tracing::error!("Ollama request timed out after {}s", self.timeout.as_secs());
                    ThreadchatError::RemoteModel(format!(
                        "Ollama request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })?
        } else {
            builder.timeout(self.timeout).send().await
        };

        let response = sent.map_err(|e| {
            tracing::error!("Ollama request failed: {}", e);
            ThreadchatError::RemoteModel(format!("Ollama request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(ThreadchatError::RemoteModel(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

/// Convert messages to the Ollama wire format
fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
    messages
        .iter()
        .map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .collect()
}

/// Classify one NDJSON line of a streaming reply
fn decode_stream_line(line: &str) -> Result<LineEvent> {
    let chunk: OllamaResponse = serde_json::from_str(line).map_err(|e| {
        ThreadchatError::RemoteModel(format!("Malformed Ollama stream line: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(ThreadchatError::RemoteModel(format!("Ollama error: {}", error)).into());
    }

    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        tracing::debug!(
            "Ollama stream done: prompt_tokens={}, completion_tokens={}",
            chunk.prompt_eval_count,
            chunk.eval_count
        );
        Ok(LineEvent::Done(text))
    } else {
        Ok(LineEvent::Fragment(text))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse> {
        let request = self.build_request(messages, false);
        let response = self.send(&request).await?;

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            ThreadchatError::RemoteModel(format!("Failed to parse Ollama response: {}", e))
        })?;

        if let Some(error) = ollama_response.error {
            return Err(ThreadchatError::RemoteModel(format!("Ollama error: {}", error)).into());
        }

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let content = ollama_response
            .message
            .map(|m| m.content)
            .unwrap_or_default();
        let message = Message::assistant(content);

        let response = if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0
        {
            let usage = TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            );
            CompletionResponse::with_usage(message, usage)
        } else {
            CompletionResponse::new(message)
        };

        Ok(response)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let request = self.build_request(messages, true);
        let response = self.send(&request).await?;
        Ok(fragments(
            byte_lines(response.bytes_stream(), self.timeout),
            decode_stream_line,
        ))
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}
