//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.ipl-sql.toml` in current directory
//! 4. `~/.config/ipl-sql/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! provider = "gemini"          # gemini, openai, anthropic, ollama
//! model = "gemini-1.5-pro-latest"
//! api_key = "..."              # or use LLM_API_KEY
//! google_api_key = "..."       # Gemini only, or use GOOGLE_API_KEY
//! ollama_url = "http://localhost:11434"
//!
//! [retry]
//! max_retries = 0
//!
//! [database]
//! ipl_path = "ipl.db"
//! deliveries_path = "deliveries.db"
//! ipl_catalog = "ipl_db"
//! deliveries_catalog = "deliveries_db"
//! dialect = "sqlite"
//! max_rows = 10000
//!
//! [prompt]
//! template_path = "prompt.txt"
//!
//! [server]
//! addr = "127.0.0.1:8000"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `LLM_API_KEY` | API key for the selected provider |
//! | `GOOGLE_API_KEY` | Gemini-only fallback when no other key is set |
//! | `LLM_PROVIDER` | Provider name |
//! | `LLM_MODEL` | Model identifier |
//! | `OLLAMA_URL` | Ollama base URL |
//! | `IPL_DB_PATH` | Match table database file |
//! | `DELIVERIES_DB_PATH` | Delivery table database file |
//! | `IPL_SQL_ADDR` | HTTP listen address |

use std::{env, fs, path::PathBuf};

use serde::Deserialize;

use crate::error::{AppResult, config_error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm:      LlmConfig,
    #[serde(default)]
    pub retry:    RetryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub prompt:   PromptConfig,
    #[serde(default)]
    pub server:   ServerConfig
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider:       Option<String>,
    pub api_key:        Option<String>,
    /// Used for Gemini when `api_key` is unset
    pub google_api_key: Option<String>,
    pub model:          Option<String>,
    pub ollama_url:     Option<String>
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider:       None,
            api_key:        None,
            google_api_key: None,
            model:          None,
            ollama_url:     Some(String::from("http://localhost:11434"))
        }
    }
}

/// Retry configuration for LLM requests.
///
/// Every question makes exactly one outbound call unless `max_retries` is
/// raised.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries:      u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms:     u64,
    pub backoff_factor:   f64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries:      0,
            initial_delay_ms: 1000,
            max_delay_ms:     30000,
            backoff_factor:   2.0
        }
    }
}

/// Backing database files and the catalogs they are attached under
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub ipl_path:           PathBuf,
    pub deliveries_path:    PathBuf,
    pub ipl_catalog:        String,
    pub deliveries_catalog: String,
    /// SQL dialect used by the statement guard
    pub dialect:            String,
    /// Cap on materialized rows, `None` for unlimited
    pub max_rows:           Option<usize>
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            ipl_path:           PathBuf::from("ipl.db"),
            deliveries_path:    PathBuf::from("deliveries.db"),
            ipl_catalog:        String::from("ipl_db"),
            deliveries_catalog: String::from("deliveries_db"),
            dialect:            String::from("sqlite"),
            max_rows:           None
        }
    }
}

/// Prompt template source
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PromptConfig {
    /// File holding a custom instructional template
    pub template_path: Option<PathBuf>
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: String::from("127.0.0.1:8000")
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.ipl-sql.toml)
    /// 3. Config file in home directory (~/.config/ipl-sql/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("ipl-sql")
                .join("config.toml");
            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".ipl-sql.toml");
        if local_config.exists() {
            config = Self::from_file(&local_config)?;
        }

        config.apply_env(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &std::path::Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse TOML config text
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Override values from environment lookups
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }
        if let Some(api_key) = lookup("GOOGLE_API_KEY") {
            self.llm.google_api_key = Some(api_key);
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = Some(provider);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = Some(url);
        }
        if let Some(path) = lookup("IPL_DB_PATH") {
            self.database.ipl_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("DELIVERIES_DB_PATH") {
            self.database.deliveries_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("IPL_SQL_ADDR") {
            self.server.addr = addr;
        }
    }

    /// Check values that are spliced into SQL text
    pub fn validate(&self) -> AppResult<()> {
        for catalog in [&self.database.ipl_catalog, &self.database.deliveries_catalog] {
            if !is_plain_identifier(catalog) {
                return Err(config_error(format!(
                    "Catalog name '{}' must be a plain identifier",
                    catalog
                )));
            }
        }
        if self.database.ipl_catalog.eq_ignore_ascii_case(&self.database.deliveries_catalog) {
            return Err(config_error("Catalog names must differ"));
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
