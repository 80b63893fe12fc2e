use crate::cli::ThreadCommand;
use crate::error::Result;
use crate::providers::Message;
use crate::session::{EMPTY_SIDEBAR_MESSAGE, UNTITLED_LABEL};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_WIDTH: usize = 40;

/// Shorten a title to fit the listing column
fn fit_title(title: &str) -> String {
    if title.trim().is_empty() {
        return UNTITLED_LABEL.to_string();
    }
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Print a thread's messages, one block per message
pub fn print_messages(messages: &[Message]) {
    for message in messages {
        if message.is_user() {
            println!("{} {}", "You:".green().bold(), message.content);
        } else {
            println!("{} {}", "Assistant:".cyan().bold(), message.content);
        }
        println!();
    }
}

/// Handle thread management commands
pub fn handle_threads(
    command: ThreadCommand,
    storage: &SqliteStorage,
    history_limit: Option<usize>,
) -> Result<()> {
    match command {
        ThreadCommand::List => {
            let summaries = storage.list_summaries()?;

            if summaries.is_empty() {
                println!("{}", EMPTY_SIDEBAR_MESSAGE.yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Title".bold(),
                "Messages".bold(),
                "Created".bold()
            ]);

            for summary in summaries {
                let count = storage.message_count(&summary.thread_id)?;
                let created = summary.created_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![
                    summary.thread_id.short().cyan(),
                    fit_title(&summary.summary),
                    count,
                    created
                ]);
            }

            println!("\nConversations:");
            table.printstd();
            println!();
            println!(
                "Use {} to resume a conversation.",
                "threadchat chat --resume <ID>".cyan()
            );
            println!();
        }
        ThreadCommand::Show { id, limit } => {
            let thread_id = storage.resolve_thread_id(&id)?;
            let summary = storage.get_summary(&thread_id)?;
            let messages = storage.load_messages(&thread_id, limit.or(history_limit))?;

            let title = summary
                .map(|s| fit_title(&s))
                .unwrap_or_else(|| UNTITLED_LABEL.to_string());
            println!("\n{} {}", title.bold(), format!("({})", thread_id).dimmed());
            println!();

            if messages.is_empty() {
                println!("{}", "This thread has no stored messages.".yellow());
            } else {
                print_messages(&messages);
            }
        }
        ThreadCommand::Delete { id, purge } => {
            let thread_id = storage.resolve_thread_id(&id)?;
            storage.delete_summary(&thread_id)?;
            if purge {
                let removed = storage.purge_messages(&thread_id)?;
                println!(
                    "{}",
                    format!("Deleted conversation {} ({} messages)", thread_id, removed).green()
                );
            } else {
                println!("{}", format!("Deleted conversation {}", thread_id).green());
            }
        }
    }

    Ok(())
}
