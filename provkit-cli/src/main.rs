use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod session;

use session::SessionOptions;

#[derive(Parser)]
#[command(name = "provkit", about = "Manage model provider sources and model bindings")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    /// Dashboard API base URL (overrides config and PROVKIT_API_BASE)
    #[arg(long, global = true, value_name = "URL")]
    api_base: Option<String>,

    /// Provider type tab, e.g. chat_completion, tts, embedding
    #[arg(long, global = true)]
    tab: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List provider templates
    Templates(commands::templates::TemplatesArgs),
    /// Manage provider sources
    Sources(commands::sources::SourcesArgs),
    /// Manage models bound under a source
    Models(commands::models::ModelsArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = SessionOptions {
        api_base: cli.api_base,
        tab: cli.tab,
        assume_yes: cli.yes,
    };

    match cli.command {
        Commands::Templates(args) => commands::templates::run(args, &options).await,
        Commands::Sources(args) => commands::sources::run(args, &options).await,
        Commands::Models(args) => commands::models::run(args, &options).await,
        Commands::Config(args) => commands::config::run(args),
    }
}
