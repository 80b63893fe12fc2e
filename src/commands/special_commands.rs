//! Special commands parser for interactive chat mode
//!
//! This module parses the commands that can be entered during an interactive
//! chat session instead of a message. Special commands allow users to:
//! - Start a new conversation
//! - List, open and delete saved threads
//! - Show the current thread's title
//! - Display help information
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive. Thread ids keep
//! the case they were typed in.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the session rather than being sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new draft thread
    NewChat,

    /// List saved threads
    ListThreads,

    /// Open a saved thread by id or id prefix
    OpenThread(String),

    /// Delete a saved thread's title by id or id prefix
    ///
    /// `purge` also removes the thread's stored messages.
    DeleteThread { id: String, purge: bool },

    /// Show the active thread's title and id
    ShowTitle,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent as a regular message.
    None,
}

/// Split `input` into its lowercased command word and the original-case rest
fn split_command(input: &str) -> (String, &str) {
    match input.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (input.to_lowercase(), ""),
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns CommandError::UnknownCommand if input starts with "/" but is not a valid command.
/// Returns CommandError::UnsupportedArgument if a command receives an invalid argument.
/// Returns CommandError::MissingArgument if a command requires an argument but none was provided.
///
/// # Examples
///
/// ```
/// use threadchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/open 1a2b3c4d").unwrap();
/// assert_eq!(cmd, SpecialCommand::OpenThread("1a2b3c4d".to_string()));
///
/// let cmd = parse_special_command("hello model").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// // Invalid command returns error
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if !trimmed.starts_with('/') {
        return match lower.as_str() {
            "exit" | "quit" => Ok(SpecialCommand::Exit),
            _ => Ok(SpecialCommand::None),
        };
    }

    let (command, rest) = split_command(trimmed);

    match command.as_str() {
        "/new" | "/reset" if rest.is_empty() => Ok(SpecialCommand::NewChat),
        "/threads" | "/list" if rest.is_empty() => Ok(SpecialCommand::ListThreads),
        "/title" if rest.is_empty() => Ok(SpecialCommand::ShowTitle),
        "/help" | "/?" if rest.is_empty() => Ok(SpecialCommand::Help),
        "/exit" | "/quit" if rest.is_empty() => Ok(SpecialCommand::Exit),

        "/new" | "/reset" | "/threads" | "/list" | "/title" | "/help" | "/?" | "/exit"
        | "/quit" => Err(CommandError::UnsupportedArgument {
            command: command.clone(),
            arg: rest.to_string(),
        }),

        "/open" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/open".to_string(),
                    usage: "/open <thread-id>".to_string(),
                })
            } else if rest.contains(char::is_whitespace) {
                Err(CommandError::UnsupportedArgument {
                    command: "/open".to_string(),
                    arg: rest.to_string(),
                })
            } else {
                Ok(SpecialCommand::OpenThread(rest.to_string()))
            }
        }

        "/delete" => {
            let mut id = None;
            let mut purge = false;
            for arg in rest.split_whitespace() {
                match arg {
                    "--purge" => purge = true,
                    _ if id.is_none() => id = Some(arg.to_string()),
                    _ => {
                        return Err(CommandError::UnsupportedArgument {
                            command: "/delete".to_string(),
                            arg: arg.to_string(),
                        })
                    }
                }
            }
            match id {
                Some(id) => Ok(SpecialCommand::DeleteThread { id, purge }),
                None => Err(CommandError::MissingArgument {
                    command: "/delete".to_string(),
                    usage: "/delete <thread-id> [--purge]".to_string(),
                }),
            }
        }

        // Unknown command starting with "/"
        _ => Err(CommandError::UnknownCommand(command.clone())),
    }
}

/// Display help text for special commands
///
/// # Examples
///
/// ```
/// use threadchat::commands::special_commands::print_help;
///
/// print_help();
/// ```
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CONVERSATIONS:
  /new              - Start a new conversation
  /reset            - Same as /new
  /threads          - List saved conversations, most recent first
  /list             - Same as /threads
  /open <id>        - Open a saved conversation (full id or 8-char prefix)
  /delete <id>      - Remove a conversation from the list
  /delete <id> --purge
                    - Remove it and delete its stored messages too

SESSION INFORMATION:
  /title            - Show the current conversation's title and id
  /help             - Show this help message
  /?                - Same as /help

SESSION CONTROL:
  exit              - Exit interactive mode
  quit              - Same as exit

NOTES:
  - Commands are case-insensitive, thread ids are not
  - Regular text (not starting with /) is sent to the model
  - A new conversation is saved once its first message is sent
  - Deleting without --purge keeps the messages; the thread can still be
    opened by id
"#
    );
}
