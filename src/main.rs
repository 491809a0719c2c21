mod cli;
mod gemini_client;
mod proxy;
mod types;

#[cfg(test)]
mod test_support;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::{ChatArgs, ChatContext};
use crate::proxy::ServeArgs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat proxy serving POST /api/chat
    Serve(ServeArgs),

    /// Start a chat session against a running proxy
    Chat(ChatArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Serve(args)) => {
            info!("Starting Gemini web chat proxy");
            proxy::serve(&args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Chat(args)) => run_chat(&args).await,
        // Default to chat if no subcommand is provided
        None => run_chat(&cli.chat).await,
    }
}

async fn run_chat(args: &ChatArgs) -> Result<ExitCode> {
    let mut chat_context = ChatContext::from_args(Box::new(io::stdout()), args)?;
    chat_context.run().await
}
