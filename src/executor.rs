//! Request-scoped execution against the attached table files.
//!
//! Every call opens its own in-memory SQLite connection, attaches each
//! backing file read-only under its catalog name, runs one statement, and
//! materializes all rows before the connection is dropped. Nothing is pooled
//! or reused between calls.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, types::Value as SqlValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::{AppResult, execution_error},
    schema::Schema
};

/// A database file attached under a catalog name.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub catalog: String,
    pub path:    PathBuf
}

/// Materialized rows of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns:   Vec<String>,
    pub rows:      Vec<Vec<Value>>,
    /// Rows were dropped because of the row cap
    pub truncated: bool
}

/// Runs SQL text on a fresh read-only connection per call.
#[derive(Debug, Clone)]
pub struct Executor {
    attachments: Vec<Attachment>,
    max_rows:    Option<usize>
}

impl Executor {
    pub fn new(attachments: Vec<Attachment>, max_rows: Option<usize>) -> Self {
        Self {
            attachments,
            max_rows
        }
    }

    /// Attach every table of `schema` from its configured path
    pub fn from_schema(schema: &Schema, max_rows: Option<usize>) -> Self {
        let attachments = schema
            .tables
            .iter()
            .map(|t| Attachment {
                catalog: t.catalog.clone(),
                path:    t.path.clone()
            })
            .collect();
        Self::new(attachments, max_rows)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Execute `sql` as a single statement and return all rows.
    ///
    /// # Errors
    ///
    /// Returns the engine's error text when a file cannot be attached or the
    /// statement fails to prepare, run, or decode.
    pub fn execute(&self, sql: &str) -> AppResult<QueryResult> {
        let connection = self.connect()?;
        let result = run_statement(&connection, sql, self.max_rows);
        drop(connection);
        let result = result?;
        info!(rows = result.rows.len(), truncated = result.truncated, "query executed");
        Ok(result)
    }

    /// [`Executor::execute`] on tokio's blocking pool
    pub async fn execute_async(&self, sql: String) -> AppResult<QueryResult> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.execute(&sql))
            .await
            .map_err(|e| execution_error(format!("Execution task failed: {}", e)))?
    }

    fn connect(&self) -> AppResult<Connection> {
        let connection = Connection::open_in_memory()
            .map_err(|e| execution_error(format!("Failed to open connection: {}", e)))?;
        for attachment in &self.attachments {
            debug!(catalog = %attachment.catalog, path = %attachment.path.display(), "attaching");
            connection
                .execute(
                    &format!("ATTACH DATABASE ?1 AS {}", attachment.catalog),
                    [read_only_uri(&attachment.path)]
                )
                .map_err(|e| {
                    execution_error(format!(
                        "Failed to attach '{}' as {}: {}",
                        attachment.path.display(),
                        attachment.catalog,
                        e
                    ))
                })?;
        }
        connection
            .execute_batch("PRAGMA query_only = ON;")
            .map_err(|e| execution_error(e.to_string()))?;
        Ok(connection)
    }
}

fn run_statement(connection: &Connection, sql: &str, max_rows: Option<usize>) -> AppResult<QueryResult> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|e| execution_error(e.to_string()))?;
    let columns: Vec<String> = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut rows = statement
        .query([])
        .map_err(|e| execution_error(e.to_string()))?;
    let mut result = QueryResult {
        columns,
        ..Default::default()
    };
    while let Some(row) = rows.next().map_err(|e| execution_error(e.to_string()))? {
        if max_rows.is_some_and(|cap| result.rows.len() >= cap) {
            result.truncated = true;
            break;
        }
        let mut record = Vec::with_capacity(result.columns.len());
        for index in 0..result.columns.len() {
            let value: SqlValue = row
                .get(index)
                .map_err(|e| execution_error(e.to_string()))?;
            record.push(json_value_from_sql(value));
        }
        result.rows.push(record);
    }
    Ok(result)
}

/// `file:` URI opening `path` read-only
pub fn read_only_uri(path: &Path) -> String {
    let mut uri = String::from("file:");
    for c in path.to_string_lossy().chars() {
        match c {
            '?' => uri.push_str("%3f"),
            '#' => uri.push_str("%23"),
            '%' => uri.push_str("%25"),
            _ => uri.push(c)
        }
    }
    uri.push_str("?mode=ro");
    uri
}

pub(crate) fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => {
            Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }
}
