//! Threadchat - threaded chat with a hosted model
//!
//! This library provides the pieces behind the `threadchat` CLI: a durable
//! per-thread message log with generated titles, an engine that replays a
//! thread's log to the remote model, and the session state the interactive
//! shell works through.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: SQLite-backed checkpoint log and thread summaries
//! - `providers`: Remote model abstraction and implementations (Ollama, OpenAI-compatible)
//! - `engine`: Append-then-invoke conversation engine and summary generation
//! - `session`: Explicit session context for the chat shell
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use threadchat::{Config, Session, SqliteStorage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let storage = Arc::new(SqliteStorage::new()?);
//!     let engine = threadchat::commands::build_engine(&config, storage)?;
//!     let mut session = Session::new(engine, config.chat.stream)?;
//!     session.submit("Hello", |delta| print!("{}", delta)).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod providers;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use engine::{fallback_summary, ConversationEngine, ReplyEvent, ReplyStream};
pub use error::{Result, ThreadchatError};
pub use session::{Session, ThreadPhase};
pub use storage::{SqliteStorage, ThreadId, ThreadSummary};

#[cfg(test)]
pub mod test_utils;
