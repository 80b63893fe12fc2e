/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat`    - Interactive chat mode
- `ask`     - Send one message and print the reply
- `threads` - List, show and delete saved threads

The handlers stay small and lean on the library components: the provider,
the conversation engine and the session.
*/

use crate::config::Config;
use crate::engine::ConversationEngine;
use crate::error::Result;
use crate::providers::create_provider;
use crate::storage::SqliteStorage;
use std::sync::Arc;

// Special commands parser for the chat loop
pub mod special_commands;

// Thread management commands
pub mod threads;

/// Open the conversation store
///
/// An explicit path wins; otherwise the store resolves its default location.
pub fn open_storage(storage_path: Option<&str>) -> Result<Arc<SqliteStorage>> {
    let storage = match storage_path {
        Some(path) => {
            tracing::info!("Using conversation database: {}", path);
            SqliteStorage::new_with_path(path)?
        }
        None => SqliteStorage::new()?,
    };
    Ok(Arc::new(storage))
}

/// Build the engine for the configured provider
pub fn build_engine(config: &Config, storage: Arc<SqliteStorage>) -> Result<ConversationEngine> {
    let provider = create_provider(&config.provider.provider_type, &config.provider)?;
    Ok(ConversationEngine::new(provider, storage))
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Creates the provider and engine, wraps them in a `Session`, and runs a
    //! readline-based loop that sends each line to the active thread.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::threads::print_messages;
    use super::*;
    use crate::session::{Session, ThreadPhase, EMPTY_SIDEBAR_MESSAGE};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::io::Write;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `storage` - Conversation store
    /// * `resume` - Optional thread id or id prefix to open first
    ///
    /// # Examples
    ///
    /// ```
    /// use threadchat::commands::chat;
    /// use threadchat::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default(), storage, None).await?;
    /// ```
    pub async fn run_chat(
        config: Config,
        storage: Arc<SqliteStorage>,
        resume: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let engine = build_engine(&config, storage)?;
        let mut session = Session::new(engine, config.chat.stream)?;

        if let Err(e) = session.ensure_summaries().await {
            tracing::warn!("Summary backfill failed: {}", e);
        }

        if let Some(resume) = resume {
            let thread_id = session.resolve(&resume)?;
            session.select_thread(&thread_id)?;
        }

        // Create readline instance
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(
            &config.provider.provider_type,
            &session.engine().model_name(),
            session.streaming(),
        );
        print_title(&session);
        if !session.messages().is_empty() {
            print_history(&session, config.chat.history_limit);
        }

        loop {
            let prompt = format!("{} ", "you>".green().bold());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    // Add to history
                    rl.add_history_entry(trimmed)?;

                    // Check for special commands first
                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::NewChat => {
                            session.reset_chat();
                            print_title(&session);
                            continue;
                        }
                        SpecialCommand::ListThreads => {
                            print_sidebar(&session);
                            continue;
                        }
                        SpecialCommand::OpenThread(id) => {
                            match open_thread(&mut session, &id) {
                                Ok(()) => {
                                    print_title(&session);
                                    print_history(&session, config.chat.history_limit);
                                }
                                Err(e) => print_error(&e),
                            }
                            continue;
                        }
                        SpecialCommand::DeleteThread { id, purge } => {
                            match delete_thread(&mut session, &id, purge) {
                                Ok(deleted) => {
                                    println!(
                                        "{}\n",
                                        format!("Deleted conversation {}", deleted.short())
                                            .green()
                                    );
                                    print_title(&session);
                                }
                                Err(e) => print_error(&e),
                            }
                            continue;
                        }
                        SpecialCommand::ShowTitle => {
                            print_status(&session);
                            continue;
                        }
                        SpecialCommand::Help => {
                            print_help();
                            continue;
                        }
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => {
                            // Regular message
                        }
                    }

                    let had_summary = session.summary().is_some();
                    print!("{} ", "assistant>".cyan().bold());
                    let _ = std::io::stdout().flush();

                    let result = session
                        .submit(trimmed, |delta| {
                            print!("{}", delta);
                            let _ = std::io::stdout().flush();
                        })
                        .await;

                    println!("\n");
                    match result {
                        Ok(_) => {
                            if !had_summary && session.summary().is_some() {
                                print_title(&session);
                            }
                        }
                        Err(e) => print_error(&e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn open_thread(session: &mut Session, input: &str) -> Result<()> {
        let thread_id = session.resolve(input)?;
        session.select_thread(&thread_id)
    }

    fn delete_thread(
        session: &mut Session,
        input: &str,
        purge: bool,
    ) -> Result<crate::storage::ThreadId> {
        let thread_id = session.resolve(input)?;
        session.delete_thread(&thread_id, purge)?;
        Ok(thread_id)
    }

    /// Display welcome banner at the start of interactive chat mode
    fn print_welcome_banner(provider: &str, model: &str, streaming: bool) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║             Threadchat Interactive Chat - Welcome!           ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Provider: {}", provider.cyan());
        println!("Model:    {}", model.cyan());
        println!(
            "Replies:  {}\n",
            if streaming { "streamed" } else { "whole" }
        );
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn print_title(session: &Session) {
        println!("{}\n", session.title().bold());
    }

    fn print_history(session: &Session, limit: Option<usize>) {
        let messages = session.messages();
        let shown = match limit {
            Some(limit) if messages.len() > limit => {
                println!(
                    "{}\n",
                    format!("... {} earlier messages", messages.len() - limit).dimmed()
                );
                &messages[messages.len() - limit..]
            }
            _ => messages,
        };
        print_messages(shown);
    }

    fn print_sidebar(session: &Session) {
        match session.sidebar() {
            Ok(rows) if rows.is_empty() => println!("{}\n", EMPTY_SIDEBAR_MESSAGE.yellow()),
            Ok(rows) => {
                println!("\nConversations:");
                for row in rows {
                    let marker = if row.active { "*" } else { " " };
                    println!(
                        " {} {}  {}",
                        marker,
                        row.thread_id.short().cyan(),
                        row.label
                    );
                }
                println!();
            }
            Err(e) => print_error(&e),
        }
    }

    fn print_status(session: &Session) {
        let phase = match session.phase() {
            ThreadPhase::Draft => "draft (not saved yet)",
            ThreadPhase::Committed => "saved",
        };
        println!("\n{}", session.title().bold());
        println!("Thread:   {}", session.thread_id().to_string().cyan());
        println!("State:    {}", phase);
        println!("Messages: {}\n", session.messages().len());
    }

    fn print_error(error: &anyhow::Error) {
        eprintln!("{}\n", format!("Error: {}", error).red());
    }

}

// One-shot ask command handler
pub mod ask {
    //! Sends a single message into a new or existing thread.

    use super::*;
    use crate::session::Session;
    use std::io::Write;

    /// Send `text` and print the reply to stdout
    ///
    /// The thread id is reported on stderr so the reply can be piped.
    pub async fn run_ask(
        config: Config,
        storage: Arc<SqliteStorage>,
        text: String,
        thread: Option<String>,
    ) -> Result<()> {
        let engine = build_engine(&config, storage)?;
        let mut session = Session::new(engine, config.chat.stream)?;

        if let Err(e) = session.ensure_summaries().await {
            tracing::warn!("Summary backfill failed: {}", e);
        }

        if let Some(thread) = thread {
            let thread_id = session.resolve(&thread)?;
            session.select_thread(&thread_id)?;
        }

        let mut stdout = std::io::stdout();
        session
            .submit(&text, |delta| {
                let _ = write!(stdout, "{}", delta);
                let _ = stdout.flush();
            })
            .await?;
        println!();

        eprintln!("thread: {}", session.thread_id());
        if let Some(summary) = session.summary() {
            tracing::info!("Thread title: {}", summary);
        }
        Ok(())
    }

}
