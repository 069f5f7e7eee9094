//! # IPL SQL
//!
//! Ask questions about IPL cricket in plain English and get answers computed
//! from the match and delivery tables.
//!
//! A hosted language model translates each question into SQL. The text it
//! returns is repaired (labels, code fences and leading prose removed, table
//! references qualified with their catalog), checked against a read-only
//! allow-list, and executed on a fresh connection that attaches both table
//! files.
//!
//! # Quick Start
//!
//! ```bash
//! # Build the backing files once
//! ipl-sql load matches.csv --db ipl.db --table ipl
//! ipl-sql load deliveries.csv --db deliveries.db --table deliveries
//!
//! # Ask a question
//! export GOOGLE_API_KEY="..."
//! ipl-sql ask "How many matches were played in the 2008 season?"
//!
//! # Interactive session
//! ipl-sql chat
//!
//! # HTTP API on 127.0.0.1:8000
//! ipl-sql serve
//! curl -X POST localhost:8000/ask/ -H 'content-type: application/json' \
//!     -d '{"question": "Which team won the most matches in 2019?"}'
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line arguments
//! 2. Environment variables (`LLM_API_KEY`, `GOOGLE_API_KEY`, `LLM_PROVIDER`,
//!    etc.)
//! 3. `.ipl-sql.toml` in current directory
//! 4. `~/.config/ipl-sql/config.toml`
//!
//! # Logging
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`
//! (default `warn`), e.g. `RUST_LOG=ipl_sql=debug` to see raw model output.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Any failure (configuration, generation, rejection, execution)

use std::process;

use clap::Parser;
use ipl_sql::{
    app,
    cli::Cli,
    config::Config,
    error::{AppResult, error_detail}
};
use tokio::main;
use tracing_subscriber::EnvFilter;

#[main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("Error: {}", error_detail(&e));
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    app::run(cli, config).await
}
