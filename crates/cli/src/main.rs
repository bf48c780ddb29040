//! Syllabus CLI: the main entry point.
//!
//! Commands:
//! - `onboard`     Initialize config and the docs folder
//! - `ingest`      Index course documents
//! - `ask`         Ask one question, or chat interactively
//! - `courses`     List indexed courses
//! - `doctor`      Diagnose configuration and index health
//! - `completions` Print a shell completion script

use std::path::PathBuf;
use clap::{CommandFactory, Parser, Subcommand};
use syllabus_config::AppConfig;

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "syllabus",
    about = "Syllabus: ask questions about your course materials",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.syllabus/config.toml
    #[arg(short, long, global = true, env = "SYLLABUS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the docs folder
    Onboard,

    /// Index every course document in a folder
    Ingest {
        /// Folder of `.txt` course documents (defaults to `docs_path`)
        path: Option<PathBuf>,

        /// Drop both indices before ingesting
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about the indexed courses
    Ask {
        /// The question; omit to start an interactive session
        question: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List indexed courses
    Courses,

    /// Diagnose configuration and index health
    Doctor,

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_ref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Ingest { path, clear } => {
            commands::ingest::run(load_config(config_path)?, path, clear).await?
        }
        Commands::Ask { question, session } => {
            commands::ask::run(load_config(config_path)?, question, session).await?
        }
        Commands::Courses => commands::courses::run(load_config(config_path)?).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "syllabus", &mut std::io::stdout());
        }
    }

    Ok(())
}
