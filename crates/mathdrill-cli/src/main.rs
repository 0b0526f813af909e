//! mathdrill CLI — arithmetic practice from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use mathdrill_core::DrillError;

mod commands;

#[derive(Parser)]
#[command(name = "mathdrill", version, about = "Arithmetic drills with hot-score leaderboards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print generated questions without grading them
    Generate {
        /// Difficulty tier: easy, medium, hard (random when omitted)
        #[arg(long)]
        tier: Option<String>,

        /// Operators to draw from (e.g. "add,divide" or "+,/")
        #[arg(long, value_delimiter = ',')]
        ops: Vec<String>,

        /// Number of questions
        #[arg(long, default_value = "5")]
        count: usize,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Print the answer after each question
        #[arg(long)]
        show_answers: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Answer questions interactively; answers are graded and recorded
    Practice {
        /// Difficulty tier: easy, medium, hard (random when omitted)
        #[arg(long)]
        tier: Option<String>,

        /// Operators to draw from (e.g. "add,divide")
        #[arg(long, value_delimiter = ',')]
        ops: Vec<String>,

        /// Number of questions in the session
        #[arg(long, default_value = "10")]
        count: usize,

        /// User id the attempts are recorded under
        #[arg(long, default_value = "local")]
        user: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a leaderboard rebuilt from recorded history
    Rankings {
        /// Window: hourly, daily, weekly
        #[arg(long, default_value = "daily")]
        window: String,

        /// Number of entries
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show practice statistics and recent attempts for a user
    Stats {
        /// User id
        #[arg(long, default_value = "local")]
        user: String,

        /// Only list attempts from this tier
        #[arg(long)]
        tier: Option<String>,

        /// Only list attempts from this UTC day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Maximum attempts to list
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter mathdrill.toml
    Init,

    /// Check a configuration file
    Validate {
        /// Config file path (default search order when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mathdrill=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            tier,
            ops,
            count,
            seed,
            show_answers,
            format,
            config,
        } => commands::generate::execute(tier, ops, count, seed, show_answers, format, config),
        Commands::Practice {
            tier,
            ops,
            count,
            user,
            config,
        } => commands::practice::execute(tier, ops, count, user, config).await,
        Commands::Rankings {
            window,
            limit,
            config,
        } => commands::rankings::execute(window, limit, config).await,
        Commands::Stats {
            user,
            tier,
            date,
            limit,
            config,
        } => commands::stats::execute(user, tier, date, limit, config).await,
        Commands::Init => commands::init::execute(),
        Commands::Validate { config } => commands::validate::execute(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(exit_code(&e));
    }
}

/// 2 for requests or configuration that can never succeed as given, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DrillError>() {
        Some(e) if e.is_config_error() => 2,
        _ => 1,
    }
}
