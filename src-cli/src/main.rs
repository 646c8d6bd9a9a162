mod commands;
mod logging;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use vrag_core::config::PipelineConfig;
use vrag_core::error::AppError;

use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "vrag", about = "Annotate genomic variants from a local PubMed knowledge base", version)]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the vector store directory
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch abstracts for each topic and add them to the vector store
    Ingest {
        /// Comma-separated topics (default: ingest.topics from config)
        #[arg(long, value_delimiter = ',')]
        topics: Vec<String>,
    },

    /// Generate a report for every high-quality record of a VCF file
    Analyze {
        /// Path to the variant file
        vcf: PathBuf,
    },

    /// Ask one free-text question against the knowledge base
    Ask {
        question: String,
    },

    /// Check that Ollama is reachable and report store status
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(store) = cli.store.clone() {
        config.store.path = store;
    }
    logging::init_logging(&config.logging);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = %e.code, retryable = e.retryable, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: PipelineConfig) -> Result<(), AppError> {
    let pipeline = Pipeline::from_config(config)?;
    match cli.command {
        Command::Ingest { topics } => commands::ingest(&pipeline, topics, &cli.format),
        Command::Analyze { vcf } => commands::analyze(&pipeline, &vcf, &cli.format),
        Command::Ask { question } => commands::ask(&pipeline, &question, &cli.format),
        Command::Health => commands::health(&pipeline, &cli.format),
    }
}
