//! Base provider trait and common types for Threadchat
//!
//! This module defines the Provider trait that the remote model backends
//! implement, along with the message and response types shared by the store,
//! the engine and the providers.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction text sent ahead of the conversation
    System,
    /// Text typed by the user
    User,
    /// Text produced by the remote model
    Assistant,
}

impl Role {
    /// Wire/storage name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role name
    ///
    /// Unknown names map to `Assistant`, matching how non-user history is
    /// rendered.
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::providers::Role;
    ///
    /// assert_eq!(Role::parse_str("user"), Role::User);
    /// assert_eq!(Role::parse_str("ai"), Role::Assistant);
    /// ```
    pub fn parse_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "system" => Self::System,
            "user" | "human" => Self::User,
            _ => Self::Assistant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for conversation
///
/// Messages are immutable once created; a thread only ever grows by
/// appending new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Text content of the message
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::providers::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::providers::{Message, Role};
    ///
    /// let msg = Message::assistant("Hello, user!");
    /// assert_eq!(msg.role, Role::Assistant);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// True when the message was written by the user
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a non-streaming completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The assistant message produced by the model
    pub message: Message,
    /// Token usage, when the backend reports it
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage information
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a response carrying token usage
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// Incremental text fragments of a single reply
///
/// The stream is finite: it ends (`None`) after the last fragment, or yields
/// an `Err` and stops early when the remote call fails mid-way.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Provider trait for remote language models
///
/// Request = ordered list of role-tagged messages; response = text, either
/// whole or as a stream of fragments.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use threadchat::error::Result;
/// use threadchat::providers::{CompletionResponse, Message, Provider};
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(CompletionResponse::new(Message::assistant(last)))
///     }
///
///     fn model_name(&self) -> String {
///         "echo".to_string()
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the full message list and wait for the whole reply
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse>;

    /// Send the full message list and receive the reply incrementally
    ///
    /// The default implementation performs a regular completion and yields
    /// its text as a single fragment.
    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let response = self.complete(messages).await?;
        let text = response.message.content;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }

    /// Name of the configured model
    fn model_name(&self) -> String;

    /// Whether `complete_stream` delivers real incremental output
    fn supports_streaming(&self) -> bool {
        false
    }
}
