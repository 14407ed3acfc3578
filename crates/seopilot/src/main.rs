//! SEOPilot command line

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ask_command, init_command, knowledge_rebuild_command, knowledge_search_command, parse_command,
    status_command, AskOptions,
};

/// SEOPilot - assistant for local SEO consultants
#[derive(Parser)]
#[command(name = "pilot")]
#[command(about = "◆ Tool-calling assistant for local SEO consultants")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and data directories
    Init,
    /// Ask the assistant
    Ask {
        /// Prompt to send; interactive when omitted
        #[arg(short, long)]
        message: Option<String>,
        /// Conversation id to continue
        #[arg(short, long)]
        conversation: Option<String>,
        /// Provider round-trips allowed
        #[arg(long)]
        max_steps: Option<u32>,
        /// Comma-separated tool allow-list
        #[arg(long, value_delimiter = ',')]
        tools: Option<Vec<String>>,
        /// Print the tool trace as JSON
        #[arg(long)]
        trace: bool,
    },
    /// Classify a request without calling a model
    Parse {
        /// Text to classify
        text: String,
        /// Known entities as a JSON object
        #[arg(long)]
        context: Option<String>,
    },
    /// Search or index the knowledge folder
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommands,
    },
    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum KnowledgeCommands {
    /// Search knowledge notes
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Rebuild the vector index
    Rebuild,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Ask {
            message,
            conversation,
            max_steps,
            tools,
            trace,
        } => {
            ask_command(AskOptions {
                message,
                conversation,
                max_steps,
                tools,
                trace,
            })
            .await
        }
        Commands::Parse { text, context } => parse_command(text, context),
        Commands::Knowledge { command } => match command {
            KnowledgeCommands::Search { query, limit } => {
                knowledge_search_command(query, limit).await
            }
            KnowledgeCommands::Rebuild => knowledge_rebuild_command().await,
        },
        Commands::Status => status_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
