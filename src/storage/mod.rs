//! Conversation store
//!
//! Two tables live in one SQLite file. `checkpoints` is the append-only
//! per-thread message log that lets a thread be resumed by id alone.
//! `thread_summaries` holds the generated title of each thread. The two are
//! written by independent commits; deleting a summary leaves the log alone.

use crate::error::{Result, ThreadchatError};
use crate::providers::{Message, Role};
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod types;
pub use types::{ThreadId, ThreadSummary};

/// Environment variable that overrides the database location
pub const DB_PATH_ENV: &str = "THREADCHAT_DB";

fn unavailable(context: &str, err: impl Display) -> anyhow::Error {
    ThreadchatError::StorageUnavailable(format!("{}: {}", context, err)).into()
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Storage backend for threads and their summaries
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Uses `THREADCHAT_DB` when set, otherwise `chat.db` in the user's data
    /// directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var(DB_PATH_ENV) {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "threadchat", "threadchat").ok_or_else(|| {
            ThreadchatError::StorageUnavailable("Could not determine data directory".into())
        })?;

        Self::new_with_path(proj_dirs.data_dir().join("chat.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("chat.db")).unwrap();
    /// assert!(storage.list_thread_ids().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| unavailable("Failed to create database directory", e))?;
            }
        }

        let storage = Self { db_path };
        storage.init()?;
        tracing::debug!("Conversation store ready at {}", storage.db_path.display());
        Ok(storage)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| unavailable("Failed to open database", e))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| unavailable("Failed to configure database", e))?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checkpoints_thread
                ON checkpoints (thread_id, id);
            CREATE TABLE IF NOT EXISTS thread_summaries (
                thread_id TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                first_message TEXT,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(|e| unavailable("Failed to create tables", e))?;
        Ok(())
    }

    /// Append one message to a thread's checkpoint log
    ///
    /// The row is committed before this returns. The first append for an id
    /// is what makes the thread exist.
    pub fn append_message(&self, thread_id: &ThreadId, message: &Message) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, role, content, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                thread_id.as_str(),
                message.role.as_str(),
                message.content,
                now_timestamp()
            ],
        )
        .map_err(|e| unavailable("Failed to append message", e))?;

        tracing::debug!(thread = %thread_id, role = %message.role, "Appended checkpoint");
        Ok(())
    }

    /// Replay a thread's messages in order
    ///
    /// Unknown ids yield an empty list. With `limit`, only the first `limit`
    /// messages are returned.
    pub fn load_messages(&self, thread_id: &ThreadId, limit: Option<usize>) -> Result<Vec<Message>> {
        let conn = self.connect()?;
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn
            .prepare(
                "SELECT role, content FROM checkpoints
                 WHERE thread_id = ?
                 ORDER BY id ASC
                 LIMIT ?",
            )
            .map_err(|e| unavailable("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map(params![thread_id.as_str(), limit], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                Ok(Message {
                    role: Role::parse_str(&role),
                    content,
                })
            })
            .map_err(|e| unavailable("Failed to query messages", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| unavailable("Failed to read messages", e))
    }

    /// Number of persisted messages in a thread
    pub fn message_count(&self, thread_id: &ThreadId) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM checkpoints WHERE thread_id = ?",
                params![thread_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| unavailable("Failed to count messages", e))?;
        Ok(count as usize)
    }

    /// Every thread id present in the checkpoint log, each once
    ///
    /// Ordered by first appearance.
    pub fn list_thread_ids(&self) -> Result<Vec<ThreadId>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT thread_id FROM checkpoints
                 GROUP BY thread_id
                 ORDER BY MIN(id) ASC",
            )
            .map_err(|e| unavailable("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| unavailable("Failed to query threads", e))?;

        rows.map(|r| r.map(ThreadId::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| unavailable("Failed to read threads", e))
    }

    /// Delete a thread's whole checkpoint log
    ///
    /// Not part of the normal delete flow, which only removes the summary.
    /// Returns how many messages were removed.
    pub fn purge_messages(&self, thread_id: &ThreadId) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn
            .execute(
                "DELETE FROM checkpoints WHERE thread_id = ?",
                params![thread_id.as_str()],
            )
            .map_err(|e| unavailable("Failed to purge messages", e))?;
        tracing::info!(thread = %thread_id, removed, "Purged thread messages");
        Ok(removed)
    }

    /// Saved title of a thread, if any
    pub fn get_summary(&self, thread_id: &ThreadId) -> Result<Option<String>> {
        Ok(self.get_summary_record(thread_id)?.map(|r| r.summary))
    }

    /// Full summary row of a thread, if any
    pub fn get_summary_record(&self, thread_id: &ThreadId) -> Result<Option<ThreadSummary>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT thread_id, summary, first_message, created_at
             FROM thread_summaries WHERE thread_id = ?",
            params![thread_id.as_str()],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(ThreadSummary {
                    thread_id: ThreadId::from(row.get::<_, String>(0)?),
                    summary: row.get(1)?,
                    first_message: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()
        .map_err(|e| unavailable("Failed to query summary", e))
    }

    /// Insert or replace a thread's title
    ///
    /// Keyed by thread id. Re-saving keeps the original `created_at`, so a
    /// thread does not jump to the top of the listing.
    pub fn save_summary(
        &self,
        thread_id: &ThreadId,
        summary: &str,
        first_message: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO thread_summaries (thread_id, summary, first_message, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                summary = excluded.summary,
                first_message = excluded.first_message",
            params![thread_id.as_str(), summary, first_message, now_timestamp()],
        )
        .map_err(|e| unavailable("Failed to save summary", e))?;

        tracing::debug!(thread = %thread_id, summary, "Saved thread summary");
        Ok(())
    }

    /// All saved summaries, most recently created first
    pub fn list_summaries(&self) -> Result<Vec<ThreadSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT thread_id, summary, first_message, created_at
                 FROM thread_summaries
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| unavailable("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map([], |row| {
                let created_at: String = row.get(3)?;
                Ok(ThreadSummary {
                    thread_id: ThreadId::from(row.get::<_, String>(0)?),
                    summary: row.get(1)?,
                    first_message: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .map_err(|e| unavailable("Failed to query summaries", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| unavailable("Failed to read summaries", e))
    }

    /// Remove a thread's summary row
    ///
    /// The checkpoint log is not touched; see [`Self::purge_messages`].
    pub fn delete_summary(&self, thread_id: &ThreadId) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM thread_summaries WHERE thread_id = ?",
            params![thread_id.as_str()],
        )
        .map_err(|e| unavailable("Failed to delete summary", e))?;
        tracing::info!(thread = %thread_id, "Deleted thread summary");
        Ok(())
    }

    /// Resolve a full id or an id prefix to a known thread
    ///
    /// Threads known only through a summary row count as well. An exact
    /// match wins over prefix matches.
    pub fn resolve_thread_id(&self, input: &str) -> Result<ThreadId> {
        let input = input.trim();
        let mut known = self.list_thread_ids()?;
        for summary in self.list_summaries()? {
            if !known.contains(&summary.thread_id) {
                known.push(summary.thread_id);
            }
        }

        if let Some(exact) = known.iter().find(|id| id.as_str() == input) {
            return Ok(exact.clone());
        }

        let mut matches: Vec<ThreadId> = if input.is_empty() {
            Vec::new()
        } else {
            known
                .into_iter()
                .filter(|id| id.as_str().starts_with(input))
                .collect()
        };

        match (matches.pop(), matches.len()) {
            (None, _) => Err(ThreadchatError::ThreadNotFound(input.to_string()).into()),
            (Some(id), 0) => Ok(id),
            (Some(_), rest) => Err(ThreadchatError::AmbiguousThreadId {
                prefix: input.to_string(),
                matches: rest + 1,
            }
            .into()),
        }
    }
}
