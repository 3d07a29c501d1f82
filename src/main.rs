//! Metis - Continual Learning Memory for Coding Agents
//!
//! This is the main entry point for the metis CLI, which observes tool
//! outcomes, distills them into lessons, and injects the relevant ones
//! back into agent prompts.

use clap::{Parser, Subcommand};
use metis_core::error::Result;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};

mod cli;

#[derive(Parser)]
#[command(name = "metis")]
#[command(about = "Continual learning memory for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Store directory (overrides METIS_HOME env var and default)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store layout and default config
    Init,

    /// Record one tool invocation from stdin (JSON payload)
    Observe,

    /// Analyze logged events and an optional prompt into lesson candidates
    Learn {
        /// User prompt to score for corrective intent
        #[arg(short, long)]
        prompt: Option<String>,

        /// File the conversation is focused on
        #[arg(short, long)]
        file: Option<String>,

        /// The agent edited a file just before this prompt
        #[arg(long)]
        recent_edit: bool,
    },

    /// Record feedback on a playbook lesson
    Feedback {
        /// Delta id the feedback applies to
        delta_id: String,

        /// Signal: helpful, not-helpful or human
        signal: String,
    },

    /// Promote ready candidates and archive stale records
    Evolve,

    /// Rank learned records against a context and print the injection block
    Inject {
        /// File the agent is working on
        #[arg(short, long)]
        file: Option<String>,

        /// Free-text task description
        #[arg(short, long)]
        prompt: Option<String>,

        /// Comma-separated context tags
        #[arg(short, long)]
        tags: Option<String>,

        /// Token budget for the block (default from config)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show store statistics
    Status,

    /// Export promoted lessons as Markdown
    Export {
        /// Output path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    // Both the binary and the core library log under the chosen level
    let filter = EnvFilter::new(format!(
        "metis={0},metis_core={0}",
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Metis v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init => cli::init::handle(cli.store),
        Commands::Observe => cli::observe::handle(cli.store),
        Commands::Learn {
            prompt,
            file,
            recent_edit,
        } => cli::learn::handle(prompt, file, recent_edit, cli.store),
        Commands::Feedback { delta_id, signal } => {
            cli::feedback::handle(delta_id, signal, cli.store)
        }
        Commands::Evolve => cli::evolve::handle(cli.store),
        Commands::Inject {
            file,
            prompt,
            tags,
            budget,
            format,
        } => cli::inject::handle(file, prompt, tags, budget, format, cli.store),
        Commands::Status => cli::status::handle(cli.store),
        Commands::Export { output } => cli::export::handle(output, cli.store),
    }
}
