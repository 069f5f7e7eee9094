use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// IPL SQL - Ask questions about IPL matches in plain English
#[derive(Parser, Debug)]
#[command(name = "ipl-sql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate a question to SQL and run it
    Ask {
        /// Question in plain English
        question: String,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        db: DbArgs,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Print the generated SQL without executing it
        #[arg(long)]
        dry_run: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },
    /// Answer questions read line by line from stdin
    Chat {
        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        db: DbArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },
    /// Serve the HTTP API
    Serve {
        /// Listen address (overrides config and IPL_SQL_ADDR)
        #[arg(long)]
        addr: Option<String>,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        db: DbArgs
    },
    /// Import a CSV file into a table of a database file
    Load {
        /// CSV file with a header row
        csv: PathBuf,

        /// Database file to create or extend
        #[arg(long)]
        db: PathBuf,

        /// Table name
        #[arg(short, long)]
        table: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },
    /// Print the instructions sent to the model
    Prompt
}

/// Model selection and credentials
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// LLM provider (defaults to config, then gemini)
    #[arg(short, long, value_enum)]
    pub provider: Option<Provider>,

    /// API key for the hosted providers
    #[arg(short, long)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    pub ollama_url: Option<String>
}

/// Backing file overrides
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// Match table database file
    #[arg(long)]
    pub ipl_db: Option<PathBuf>,

    /// Delivery table database file
    #[arg(long)]
    pub deliveries_db: Option<PathBuf>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Get default model for provider
    pub fn default_model(&self) -> &str {
        match self {
            Self::Gemini => "gemini-1.5-pro-latest",
            Self::OpenAI => "gpt-4",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    /// Parse a provider name from configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" | "open-ai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}
