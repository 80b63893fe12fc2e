//! Test utilities for Threadchat
//!
//! This module provides a scripted provider and temporary storage helpers
//! shared by the unit tests.

use crate::error::{Result, ThreadchatError};
use crate::providers::{CompletionResponse, Message, Provider, TextStream};
use crate::storage::SqliteStorage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Every request a [`MockProvider`] has received, in order
pub type RequestLog = Arc<Mutex<Vec<Vec<Message>>>>;

/// Create a store backed by a fresh temporary directory
///
/// Keep the returned `TempDir` alive for as long as the store is used.
///
/// # Examples
///
/// ```ignore
/// use threadchat::test_utils::temp_storage;
///
/// let (storage, _dir) = temp_storage();
/// assert!(storage.list_summaries().unwrap().is_empty());
/// ```
pub fn temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let storage =
        SqliteStorage::new_with_path(dir.path().join("chat.db")).expect("Failed to open storage");
    (Arc::new(storage), dir)
}

/// Provider that replays scripted replies
///
/// `complete` pops the next scripted reply and fails once the script runs
/// out. `complete_stream` yields the configured fragments when set, and
/// otherwise falls back to a single fragment from `complete`.
pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    failure: Option<String>,
    stream: Option<Vec<String>>,
    stream_error: Option<String>,
    requests: RequestLog,
}

impl MockProvider {
    /// Provider answering `complete` calls with `replies` in order
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            failure: None,
            stream: None,
            stream_error: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(vec![])
        }
    }

    /// Stream these fragments from `complete_stream`
    pub fn with_stream(mut self, fragments: Vec<&str>) -> Self {
        self.stream = Some(fragments.into_iter().map(String::from).collect());
        self
    }

    /// Stream these fragments, then fail with `message`
    pub fn with_stream_error(mut self, fragments: Vec<&str>, message: &str) -> Self {
        self.stream = Some(fragments.into_iter().map(String::from).collect());
        self.stream_error = Some(message.to_string());
        self
    }

    /// Shared handle to the request log
    pub fn requests(&self) -> RequestLog {
        Arc::clone(&self.requests)
    }

    fn record(&self, messages: &[Message]) {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(messages.to_vec());
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse> {
        self.record(messages);
        if let Some(message) = &self.failure {
            return Err(ThreadchatError::RemoteModel(message.clone()).into());
        }
        let reply = self
            .replies
            .lock()
            .expect("reply script poisoned")
            .pop_front()
            .ok_or_else(|| ThreadchatError::RemoteModel("script exhausted".to_string()))?;
        Ok(CompletionResponse::new(Message::assistant(reply)))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let Some(fragments) = self.stream.clone() else {
            let response = self.complete(messages).await?;
            let text = response.message.content;
            return Ok(Box::pin(futures::stream::once(async move { Ok(text) })));
        };

        self.record(messages);
        if let Some(message) = &self.failure {
            return Err(ThreadchatError::RemoteModel(message.clone()).into());
        }

        let mut items: Vec<Result<String>> = fragments.into_iter().map(Ok).collect();
        if let Some(message) = &self.stream_error {
            items.push(Err(ThreadchatError::RemoteModel(message.clone()).into()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_name(&self) -> String {
        "mock".to_string()
    }

    fn supports_streaming(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_temp_storage_creation() {
        let (storage, dir) = temp_storage();
        assert!(storage.db_path().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_mock_provider_script_order() {
        let provider = MockProvider::new(vec!["a", "b"]);
        let first = provider.complete(&[Message::user("1")]).await.unwrap();
        let second = provider.complete(&[Message::user("2")]).await.unwrap();
        assert_eq!(first.message.content, "a");
        assert_eq!(second.message.content, "b");
        assert!(provider.complete(&[Message::user("3")]).await.is_err());
        assert_eq!(provider.requests().lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_stream_error_after_fragments() {
        let provider = MockProvider::new(vec![]).with_stream_error(vec!["x"], "boom");
        let mut stream = provider.complete_stream(&[]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "x");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
