//! Conversation engine
//!
//! Bridges a thread's durable history and the remote model. Every send first
//! appends the user message to the thread's checkpoint log, then replays the
//! whole log as the request, so callers never resend history themselves.

use crate::error::Result;
use crate::providers::{Message, Provider, TextStream};
use crate::storage::{SqliteStorage, ThreadId};
use futures::StreamExt;
use std::sync::Arc;

/// Most words a generated title may keep
pub const SUMMARY_MAX_WORDS: usize = 4;

/// Characters kept by the fallback title when the input has few words
pub const SUMMARY_FALLBACK_CHARS: usize = 20;

const SUMMARY_PROMPT: &str = "Generate a very brief 3-4 word summary or title for this message.\n\
Only return the summary, nothing else.\n\
Message: ";

/// Local title used whenever the model cannot produce one
///
/// Inputs with at least four words keep their first four words, anything
/// shorter keeps its first 20 characters. An ellipsis is always appended.
///
/// # Examples
///
/// ```
/// use threadchat::engine::fallback_summary;
///
/// assert_eq!(
///     fallback_summary("How do I bake sourdough bread at home"),
///     "How do I bake..."
/// );
/// assert_eq!(fallback_summary("Hello"), "Hello...");
/// assert_eq!(fallback_summary(""), "...");
/// ```
pub fn fallback_summary(text: &str) -> String {
    let text = text.trim();
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() >= SUMMARY_MAX_WORDS {
        format!("{}...", words[..SUMMARY_MAX_WORDS].join(" "))
    } else {
        let prefix: String = text.chars().take(SUMMARY_FALLBACK_CHARS).collect();
        format!("{}...", prefix)
    }
}

/// Clamp a model-produced title to four words
///
/// Returns `None` for an empty reply.
fn clamp_summary(reply: &str) -> Option<String> {
    let reply = reply.trim();
    if reply.is_empty() {
        return None;
    }

    let words: Vec<&str> = reply.split_whitespace().collect();
    if words.len() > SUMMARY_MAX_WORDS {
        Some(format!("{}...", words[..SUMMARY_MAX_WORDS].join(" ")))
    } else {
        Some(reply.to_string())
    }
}

/// One step of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// Next piece of reply text
    Delta(String),
    /// The reply is complete and has been persisted
    ///
    /// Carries the assistant message, whose content is the concatenation of
    /// every delta yielded before it.
    Done(Message),
}

/// A reply being received from the remote model
///
/// Finite and single-use: after `Done` or an error, every further call to
/// [`ReplyStream::next_event`] returns `Ok(None)`.
pub struct ReplyStream {
    inner: TextStream,
    storage: Arc<SqliteStorage>,
    thread_id: ThreadId,
    buffer: String,
    finished: bool,
}

impl ReplyStream {
    /// Thread the reply belongs to
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Advance the stream
    ///
    /// When the remote stream ends cleanly the collected text is appended to
    /// the thread as an assistant message before `Done` is returned. An error
    /// ends the stream and nothing is persisted for the reply.
    pub async fn next_event(&mut self) -> Result<Option<ReplyEvent>> {
        if self.finished {
            return Ok(None);
        }

        match self.inner.next().await {
            Some(Ok(delta)) => {
                self.buffer.push_str(&delta);
                Ok(Some(ReplyEvent::Delta(delta)))
            }
            Some(Err(e)) => {
                self.finished = true;
                tracing::error!(thread = %self.thread_id, "Reply stream failed: {}", e);
                Err(e)
            }
            None => {
                self.finished = true;
                let message = Message::assistant(std::mem::take(&mut self.buffer));
                self.storage.append_message(&self.thread_id, &message)?;
                tracing::debug!(
                    thread = %self.thread_id,
                    chars = message.content.len(),
                    "Streamed reply persisted"
                );
                Ok(Some(ReplyEvent::Done(message)))
            }
        }
    }

    /// Drain the stream, handing each delta to `on_delta`
    ///
    /// Returns the persisted assistant message.
    pub async fn collect_with<F: FnMut(&str)>(mut self, mut on_delta: F) -> Result<Message> {
        while let Some(event) = self.next_event().await? {
            match event {
                ReplyEvent::Delta(delta) => on_delta(&delta),
                ReplyEvent::Done(message) => return Ok(message),
            }
        }
        // next_event always yields Done before None on the success path
        Err(crate::error::ThreadchatError::RemoteModel(
            "Reply stream ended without completing".to_string(),
        )
        .into())
    }
}

/// Conversation engine
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use threadchat::config::Config;
/// use threadchat::engine::ConversationEngine;
/// use threadchat::providers::create_provider;
/// use threadchat::storage::{SqliteStorage, ThreadId};
///
/// # async fn example() -> threadchat::error::Result<()> {
/// let config = Config::default();
/// let provider = create_provider(&config.provider.provider_type, &config.provider)?;
/// let storage = Arc::new(SqliteStorage::new()?);
/// let engine = ConversationEngine::new(provider, storage);
///
/// let reply = engine.send(&ThreadId::generate(), "Hello").await?;
/// println!("{}", reply.content);
/// # Ok(())
/// # }
/// ```
pub struct ConversationEngine {
    provider: Box<dyn Provider>,
    storage: Arc<SqliteStorage>,
}

impl ConversationEngine {
    /// Create an engine over a provider and a store
    pub fn new(provider: Box<dyn Provider>, storage: Arc<SqliteStorage>) -> Self {
        Self { provider, storage }
    }

    /// The underlying conversation store
    pub fn storage(&self) -> &Arc<SqliteStorage> {
        &self.storage
    }

    /// Name of the active model
    pub fn model_name(&self) -> String {
        self.provider.model_name()
    }

    /// Whether the provider streams replies incrementally
    pub fn supports_streaming(&self) -> bool {
        self.provider.supports_streaming()
    }

    /// Append the user message and replay the thread's log
    fn prepare(&self, thread_id: &ThreadId, text: &str) -> Result<Vec<Message>> {
        self.storage.append_message(thread_id, &Message::user(text))?;
        let history = self.storage.load_messages(thread_id, None)?;
        tracing::debug!(
            thread = %thread_id,
            messages = history.len(),
            "Invoking remote model"
        );
        Ok(history)
    }

    /// Send a user message and wait for the whole reply
    ///
    /// The user message is durable before the model is called. On a model
    /// failure it stays in the log without a reply.
    pub async fn send(&self, thread_id: &ThreadId, text: &str) -> Result<Message> {
        let history = self.prepare(thread_id, text)?;

        let response = self.provider.complete(&history).await.map_err(|e| {
            tracing::error!(thread = %thread_id, "Remote model call failed: {}", e);
            e
        })?;

        if let Some(usage) = response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let reply = Message::assistant(response.message.content);
        self.storage.append_message(thread_id, &reply)?;
        Ok(reply)
    }

    /// Send a user message and receive the reply incrementally
    ///
    /// The assistant message is persisted once the returned stream completes.
    pub async fn send_stream(&self, thread_id: &ThreadId, text: &str) -> Result<ReplyStream> {
        let history = self.prepare(thread_id, text)?;

        let inner = self.provider.complete_stream(&history).await.map_err(|e| {
            tracing::error!(thread = %thread_id, "Remote model stream failed to start: {}", e);
            e
        })?;

        Ok(ReplyStream {
            inner,
            storage: Arc::clone(&self.storage),
            thread_id: thread_id.clone(),
            buffer: String::new(),
            finished: false,
        })
    }

    /// Generate a short title for a first message
    ///
    /// Never fails: an empty input, an empty reply or any model error yields
    /// [`fallback_summary`].
    pub async fn summarize(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return fallback_summary(text);
        }

        let prompt = format!("{}{}", SUMMARY_PROMPT, text);
        match self.provider.complete(&[Message::user(prompt)]).await {
            Ok(response) => match clamp_summary(&response.message.content) {
                Some(summary) => summary,
                None => {
                    tracing::warn!("Model returned an empty summary, using fallback");
                    fallback_summary(text)
                }
            },
            Err(e) => {
                tracing::warn!("Summary generation failed, using fallback: {}", e);
                fallback_summary(text)
            }
        }
    }
}
