//! Error types for Threadchat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Threadchat operations
///
/// Storage and remote model failures are the two classes that reach the
/// user. Reading an unknown thread is never an error: store lookups return
/// an empty list or `None` instead.
#[derive(Error, Debug)]
pub enum ThreadchatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The conversation store could not be opened or queried
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The remote model call failed or timed out
    #[error("Remote model error: {0}")]
    RemoteModel(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// A thread id (or id prefix) given on the command line matched nothing
    #[error("No thread matches '{0}'")]
    ThreadNotFound(String),

    /// A thread id prefix matched more than one thread
    #[error("Thread id prefix '{prefix}' is ambiguous ({matches} matches)")]
    AmbiguousThreadId {
        /// The prefix that was supplied
        prefix: String,
        /// How many known threads share the prefix
        matches: usize,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Threadchat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
