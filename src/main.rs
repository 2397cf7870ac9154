//! # Finsight CLI (`finsight`)
//!
//! ## Usage
//!
//! ```bash
//! finsight --config ./config/finsight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `finsight init` | Create the SQLite database and run schema migrations |
//! | `finsight corpus [--topic T]...` | Fetch the Q&A corpus and print counts per category |
//! | `finsight ask "<question>"` | Answer a finance question from the corpus |
//! | `finsight compare <SYMBOL>...` | Compare recent price action of stock tickers |
//! | `finsight serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use finsight::{ask, config, corpus, logging, migrate, server, stocks};

/// Finsight: grounded answers to personal finance questions.
#[derive(Parser)]
#[command(name = "finsight", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/finsight.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Fetch the corpus without embedding it and summarise it by category.
    Corpus {
        /// Topic to fetch. Repeatable; defaults to `pipeline.topics`.
        #[arg(long = "topic")]
        topics: Vec<String>,
    },

    /// Answer a question using the closest corpus entry as context.
    Ask {
        question: String,
    },

    /// Compare stock tickers over their recent trading days.
    Compare {
        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.json_logs)?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Corpus { topics } => {
            corpus::run_corpus(&cfg, topics).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Compare { symbols } => {
            stocks::run_compare(&cfg, symbols).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
