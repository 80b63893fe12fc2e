//! Threadchat - threaded chat with a hosted model
//!
#![doc = "Threadchat - threaded chat with a hosted model"]
#![doc = "Main entry point for the Threadchat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use threadchat::cli::{Cli, Commands};
use threadchat::commands;
use threadchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let storage = commands::open_storage(cli.storage_path.as_deref())?;

    // Execute command
    match cli.command {
        Commands::Chat { resume, .. } => {
            if let Some(r) = &resume {
                tracing::debug!("Resuming thread: {}", r);
            }
            commands::chat::run_chat(config, storage, resume).await?;
            Ok(())
        }
        Commands::Ask { text, thread, .. } => {
            tracing::info!("Sending one-shot message");
            commands::ask::run_ask(config, storage, text, thread).await?;
            Ok(())
        }
        Commands::Threads { command } => {
            tracing::info!("Starting threads command");
            commands::threads::handle_threads(command, &storage, config.chat.history_limit)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so replies printed on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "threadchat=debug"
    } else {
        "threadchat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
