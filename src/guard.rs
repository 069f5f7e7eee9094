//! Read-only allow-list for generated SQL.
//!
//! Model output is untrusted. Before anything reaches the database it must
//! parse as exactly one statement, that statement must be a query, and every
//! relation it reads must be one of the attached tables or a CTE the query
//! declares itself.

use indexmap::IndexSet;
use tracing::warn;

use crate::{
    error::{AppResult, rejected_statement_error},
    query::{Query, SqlDialect, parse_queries},
    schema::Schema
};

/// Checks generated SQL against the statement and table allow-lists.
#[derive(Debug, Clone)]
pub struct StatementGuard {
    dialect: SqlDialect,
    known:   IndexSet<String>
}

/// Lowercase and drop identifier quoting so `"IPL_DB".ipl` matches `ipl_db.ipl`
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl StatementGuard {
    pub fn new(schema: &Schema, dialect: SqlDialect) -> Self {
        let known = schema
            .tables
            .iter()
            .map(|t| normalize_name(&t.qualified_name()))
            .collect();
        Self {
            dialect,
            known
        }
    }

    /// Validate `sql`, returning the parsed statement on success.
    ///
    /// # Errors
    ///
    /// - parse error for empty or unparseable text
    /// - rejection for multiple statements, non-query statements, or reads
    ///   from relations outside the allow-list
    pub fn check(&self, sql: &str) -> AppResult<Query> {
        let mut queries = parse_queries(sql, self.dialect)?;
        if queries.len() != 1 {
            warn!(count = queries.len(), "rejected multi-statement SQL");
            return Err(rejected_statement_error(format!(
                "expected exactly one statement, found {}",
                queries.len()
            )));
        }
        let query = queries.remove(0);
        if !query.is_read_only() {
            warn!(kind = %query.query_type, "rejected non-query statement");
            return Err(rejected_statement_error(format!(
                "{} statements are not allowed, only SELECT queries",
                query.query_type
            )));
        }
        let ctes: IndexSet<String> = query.cte_names.iter().map(|n| normalize_name(n)).collect();
        for table in &query.tables {
            let name = normalize_name(table);
            if !self.known.contains(&name) && !ctes.contains(&name) {
                warn!(table = %table, "rejected unknown table");
                return Err(rejected_statement_error(format!(
                    "unknown table '{}', expected one of: {}",
                    table,
                    self.known.iter().cloned().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        Ok(query)
    }
}
