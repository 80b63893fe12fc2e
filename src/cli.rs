//! Command-line interface definition for Threadchat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive chat, one-shot ask, and thread management
//! commands.

use clap::{Parser, Subcommand};

/// Threadchat - chat with a hosted model, one thread at a time
///
/// Conversations are stored locally, titled automatically from their first
/// message, and can be resumed later.
#[derive(Parser, Debug, Clone)]
#[command(name = "threadchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the conversation database (overrides the platform data dir)
    #[arg(long, env = "THREADCHAT_DB", global = true)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Threadchat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Override the provider from config (ollama, openai)
        #[arg(short, long)]
        provider: Option<String>,

        /// Resume an existing thread (full id or 8-char prefix)
        #[arg(short, long)]
        resume: Option<String>,

        /// Wait for whole replies instead of streaming them
        #[arg(long)]
        no_stream: bool,
    },

    /// Send a single message and print the reply
    Ask {
        /// Message text
        text: String,

        /// Continue an existing thread instead of starting a new one
        #[arg(short, long)]
        thread: Option<String>,

        /// Override the provider from config (ollama, openai)
        #[arg(short, long)]
        provider: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Inspect and manage saved threads
    Threads {
        /// Thread management subcommand
        #[command(subcommand)]
        command: ThreadCommand,
    },
}

/// Thread management subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ThreadCommand {
    /// List titled threads, most recent first
    List,

    /// Print the messages of a thread
    Show {
        /// Thread id or 8-char prefix
        id: String,

        /// Only print the first N messages
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete a thread's title from the listing
    Delete {
        /// Thread id or 8-char prefix
        id: String,

        /// Also delete the thread's stored messages
        #[arg(long)]
        purge: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Provider override given to `chat` or `ask`, if any
    pub fn provider_override(&self) -> Option<&str> {
        match &self.command {
            Commands::Chat { provider, .. } | Commands::Ask { provider, .. } => provider.as_deref(),
            Commands::Threads { .. } => None,
        }
    }

    /// Whether streaming was disabled on the command line
    pub fn no_stream_override(&self) -> bool {
        match &self.command {
            Commands::Chat { no_stream, .. } | Commands::Ask { no_stream, .. } => *no_stream,
            Commands::Threads { .. } => false,
        }
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Threads {
                command: ThreadCommand::List,
            },
        }
    }
}
