use std::sync::LazyLock;

pub use masterror::{AppError, AppResult};
use regex::Regex;

/// sqlparser reports positions as `Line: X, Column: Y` (older releases omit
/// the second colon).
static POSITION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Line: (\d+), Column:? (\d+)").expect("valid regex"));

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create query parse error with optional position info
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Query parse error", &msg))
}

/// Generated SQL was parsed but is not allowed to run
pub fn rejected_statement_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(format!("Rejected statement: {}", message.into()))
}

/// Database engine refused the statement or the backing files
pub fn execution_error(message: impl Into<String>) -> AppError {
    AppError::internal(message.into())
}

/// CSV loading failed
pub fn load_error(message: impl Into<String>) -> AppError {
    AppError::internal(format!("Load failed: {}", message.into()))
}

/// Create LLM API error
pub fn llm_api_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create HTTP error
pub fn http_error(err: reqwest::Error) -> AppError {
    let msg = if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    };
    AppError::service(msg)
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Human-readable text of an error, used for error envelopes.
///
/// Falls back to the error's display form when it carries no message.
pub fn error_detail(err: &AppError) -> String {
    err.message
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

fn format_sql_error(prefix: &str, message: &str) -> String {
    match extract_position(message) {
        Some((line, column)) => format!(
            "{} at line {}, column {}:\n  {}",
            prefix, line, column, message
        ),
        None => format!("{}:\n  {}", prefix, message)
    }
}

fn extract_position(message: &str) -> Option<(usize, usize)> {
    let caps = POSITION_REGEX.captures(message)?;
    let line = caps.get(1)?.as_str().parse().ok()?;
    let column = caps.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}
