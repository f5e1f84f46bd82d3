use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tokio::sync::RwLock;

use chatwarden::config::Config;
use chatwarden::logging::{setup_logging, LogLevel};
use chatwarden::{init, run};

#[derive(Parser)]
#[command(name = "chatwarden", version, about = "Twitch chat moderation bot")]
struct Args {
    /// Path to the bot configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let config = Config::new(args.config)?;
    setup_logging(args.log_level.unwrap_or(config.log_level))?;

    let config = Arc::new(RwLock::new(config));
    let clients = init(Arc::clone(&config)).await?;

    run(clients).await?;

    Ok(())
}
