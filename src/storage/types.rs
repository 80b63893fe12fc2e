use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a conversation thread
///
/// Generated client-side as a random UUID and used as the only correlation
/// key between the store, the engine and the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Generate a fresh, globally unique thread id
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::storage::ThreadId;
    ///
    /// let a = ThreadId::generate();
    /// let b = ThreadId::generate();
    /// assert_ne!(a, b);
    /// assert_eq!(a.as_str().len(), 36);
    /// ```
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for compact display
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Saved title of a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Thread the summary belongs to
    pub thread_id: ThreadId,
    /// Short generated title
    pub summary: String,
    /// Text of the first user message the title was derived from
    pub first_message: Option<String>,
    /// When the summary row was first written
    pub created_at: DateTime<Utc>,
}
