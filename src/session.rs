//! Interactive session state
//!
//! A [`Session`] is the context object the chat shell passes to every
//! handler. It owns the active thread, the render list shown for it and the
//! set of thread ids the shell knows about. A new thread starts as a local
//! draft and only becomes committed once its first message is persisted.

use crate::engine::ConversationEngine;
use crate::error::Result;
use crate::providers::{Message, Role};
use crate::storage::{SqliteStorage, ThreadId};
use std::sync::Arc;

/// Label shown for a thread whose saved summary is empty
pub const UNTITLED_LABEL: &str = "Untitled Chat";

/// Title shown while the active thread has no summary
pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";

/// Shown by the thread list when nothing has been saved yet
pub const EMPTY_SIDEBAR_MESSAGE: &str = "No conversations yet. Start a new chat!";

/// Lifecycle of the active thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPhase {
    /// Has an id but nothing is persisted; abandoning it leaves no trace
    Draft,
    /// At least one message is in the checkpoint log
    Committed,
}

/// One row of the thread list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    /// Thread the row opens
    pub thread_id: ThreadId,
    /// Summary, or [`UNTITLED_LABEL`]
    pub label: String,
    /// Whether this is the active thread
    pub active: bool,
}

/// Explicit chat session context
pub struct Session {
    engine: ConversationEngine,
    stream: bool,
    thread_id: ThreadId,
    phase: ThreadPhase,
    messages: Vec<Message>,
    summary: Option<String>,
    chat_threads: Vec<ThreadId>,
}

impl Session {
    /// Start a session on a fresh draft thread
    ///
    /// The known-thread cache is seeded from the store's checkpoint log.
    /// Streaming is only used when the provider delivers real increments;
    /// otherwise replies arrive whole.
    pub fn new(engine: ConversationEngine, stream: bool) -> Result<Self> {
        let chat_threads = engine.storage().list_thread_ids()?;
        tracing::debug!("Session started with {} known threads", chat_threads.len());

        let stream = stream && engine.supports_streaming();
        Ok(Self {
            engine,
            stream,
            thread_id: ThreadId::generate(),
            phase: ThreadPhase::Draft,
            messages: Vec::new(),
            summary: None,
            chat_threads,
        })
    }

    fn storage(&self) -> &Arc<SqliteStorage> {
        self.engine.storage()
    }

    /// The engine driving this session
    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Id of the active thread
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Lifecycle phase of the active thread
    pub fn phase(&self) -> ThreadPhase {
        self.phase
    }

    /// Render list of the active thread
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Cached summary of the active thread
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Thread ids known to this session
    pub fn chat_threads(&self) -> &[ThreadId] {
        &self.chat_threads
    }

    /// Whether replies are streamed
    pub fn streaming(&self) -> bool {
        self.stream
    }

    /// Heading for the active thread
    pub fn title(&self) -> String {
        match &self.summary {
            Some(summary) => format!("Chat: {}", summary),
            None => NEW_CONVERSATION_TITLE.to_string(),
        }
    }

    /// Switch to a fresh draft thread
    ///
    /// Nothing is written to the store.
    pub fn reset_chat(&mut self) {
        self.thread_id = ThreadId::generate();
        self.phase = ThreadPhase::Draft;
        self.messages.clear();
        self.summary = None;
        tracing::debug!(thread = %self.thread_id, "Started new draft thread");
    }

    fn remember_thread(&mut self, thread_id: &ThreadId) {
        if !self.chat_threads.contains(thread_id) {
            self.chat_threads.push(thread_id.clone());
        }
    }

    /// Generate and save summaries for threads that lack one
    ///
    /// Only threads whose first persisted message is from the user get a
    /// summary. Save failures are logged and skipped. Returns how many
    /// summaries were written.
    pub async fn ensure_summaries(&mut self) -> Result<usize> {
        let mut written = 0;
        for thread_id in self.chat_threads.clone() {
            if self.storage().get_summary(&thread_id)?.is_some() {
                continue;
            }

            let first = self.storage().load_messages(&thread_id, Some(1))?;
            let Some(first) = first.into_iter().next().filter(Message::is_user) else {
                continue;
            };

            let summary = self.engine.summarize(&first.content).await;
            match self
                .storage()
                .save_summary(&thread_id, &summary, &first.content)
            {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(thread = %thread_id, "Failed to backfill summary: {}", e),
            }
        }

        if written > 0 {
            tracing::info!("Backfilled {} thread summaries", written);
        }
        Ok(written)
    }

    /// Submit a user message to the active thread
    ///
    /// On the first message of a draft the summary is generated and saved
    /// before the thread joins the known-thread list. `on_delta` receives the
    /// reply as it arrives (once, whole, when streaming is off). On failure
    /// the user message stays in the render list with no reply after it.
    pub async fn submit<F: FnMut(&str)>(&mut self, text: &str, mut on_delta: F) -> Result<Message> {
        self.messages.push(Message::user(text));

        if self.phase == ThreadPhase::Draft && self.summary.is_none() {
            let summary = self.engine.summarize(text).await;
            match self.storage().save_summary(&self.thread_id, &summary, text) {
                Ok(()) => self.summary = Some(summary),
                Err(e) => tracing::warn!(
                    thread = %self.thread_id,
                    "Failed to save summary, continuing without one: {}",
                    e
                ),
            }
            let thread_id = self.thread_id.clone();
            self.remember_thread(&thread_id);
        }

        let result = if self.stream {
            match self.engine.send_stream(&self.thread_id, text).await {
                Ok(stream) => stream.collect_with(&mut on_delta).await,
                Err(e) => Err(e),
            }
        } else {
            self.engine.send(&self.thread_id, text).await.map(|reply| {
                on_delta(&reply.content);
                reply
            })
        };

        self.refresh_phase();
        let reply = result?;
        self.messages.push(reply.clone());
        Ok(reply)
    }

    fn refresh_phase(&mut self) {
        if self.phase == ThreadPhase::Draft {
            match self.storage().message_count(&self.thread_id) {
                Ok(count) if count > 0 => self.phase = ThreadPhase::Committed,
                Ok(_) => {}
                Err(e) => tracing::warn!("Could not check thread state: {}", e),
            }
        }
    }

    /// Make `thread_id` the active thread
    ///
    /// The render list is replaced by the persisted history, with every
    /// non-user message shown as an assistant message.
    pub fn select_thread(&mut self, thread_id: &ThreadId) -> Result<()> {
        let history = self.storage().load_messages(thread_id, None)?;
        let summary = self.storage().get_summary(thread_id)?;

        self.messages = history
            .into_iter()
            .map(|m| match m.role {
                Role::User => m,
                _ => Message::assistant(m.content),
            })
            .collect();
        self.phase = if self.messages.is_empty() {
            ThreadPhase::Draft
        } else {
            ThreadPhase::Committed
        };
        self.thread_id = thread_id.clone();
        self.summary = summary;
        self.remember_thread(thread_id);

        tracing::info!(
            thread = %thread_id,
            messages = self.messages.len(),
            "Selected thread"
        );
        Ok(())
    }

    /// Delete a thread's summary
    ///
    /// The message log is kept unless `purge` is set. Deleting the active
    /// thread starts a new draft.
    pub fn delete_thread(&mut self, thread_id: &ThreadId, purge: bool) -> Result<()> {
        self.storage().delete_summary(thread_id)?;
        if purge {
            self.storage().purge_messages(thread_id)?;
        }

        self.chat_threads.retain(|id| id != thread_id);
        if &self.thread_id == thread_id {
            self.reset_chat();
        }
        Ok(())
    }

    /// Rows of the thread list, most recently created first
    pub fn sidebar(&self) -> Result<Vec<SidebarEntry>> {
        Ok(self
            .storage()
            .list_summaries()?
            .into_iter()
            .map(|s| SidebarEntry {
                active: s.thread_id == self.thread_id,
                label: if s.summary.trim().is_empty() {
                    UNTITLED_LABEL.to_string()
                } else {
                    s.summary
                },
                thread_id: s.thread_id,
            })
            .collect())
    }

    /// Resolve a full id or id prefix typed by the user
    pub fn resolve(&self, input: &str) -> Result<ThreadId> {
        self.storage().resolve_thread_id(input)
    }
}
