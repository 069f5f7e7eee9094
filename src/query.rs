mod types;

use std::ops::ControlFlow;

use indexmap::IndexSet;
use sqlparser::{
    ast::{Query as AstQuery, Statement, Visit, Visitor, visit_relations},
    dialect::{Dialect, DuckDbDialect, GenericDialect, SQLiteDialect},
    parser::Parser
};
pub use types::{Query, QueryType};

use crate::error::{AppResult, config_error, query_parse_error};

/// SQL dialect for parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum SqlDialect {
    Generic,
    #[default]
    SQLite,
    DuckDb
}

impl SqlDialect {
    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {}),
            Self::DuckDb => Box::new(DuckDbDialect {})
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = masterror::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "sqlite" => Ok(Self::SQLite),
            "duckdb" => Ok(Self::DuckDb),
            other => Err(config_error(format!("Unknown SQL dialect '{}'", other)))
        }
    }
}

/// Parse SQL text into statements.
///
/// # Errors
///
/// Returns a parse error for empty text or text sqlparser rejects.
pub fn parse_queries(sql: &str, dialect: SqlDialect) -> AppResult<Vec<Query>> {
    if sql.trim().trim_end_matches(';').trim().is_empty() {
        return Err(query_parse_error("empty statement"));
    }
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| query_parse_error(e.to_string()))?;
    Ok(statements.iter().map(parse_statement).collect())
}

fn parse_statement(stmt: &Statement) -> Query {
    let mut q = Query::new(stmt.to_string(), classify(stmt));
    let mut tables = IndexSet::new();
    let _ = visit_relations(stmt, |relation| {
        tables.insert(relation.to_string());
        ControlFlow::<()>::Continue(())
    });
    q.tables = tables.into_iter().collect();
    let mut ctes = CteCollector::default();
    let _ = stmt.visit(&mut ctes);
    q.cte_names = ctes.names.into_iter().collect();
    q
}

/// CTE names declared by any query in a statement, nested ones included
#[derive(Default)]
struct CteCollector {
    names: IndexSet<String>
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &AstQuery) -> ControlFlow<Self::Break> {
        for cte in query.with.iter().flat_map(|w| &w.cte_tables) {
            self.names.insert(cte.alias.name.value.clone());
        }
        ControlFlow::Continue(())
    }
}

fn classify(stmt: &Statement) -> QueryType {
    match stmt {
        Statement::Query(_) => QueryType::Select,
        Statement::Insert(_) => QueryType::Insert,
        Statement::Update {
            ..
        } => QueryType::Update,
        Statement::Delete(_) => QueryType::Delete,
        Statement::Truncate {
            ..
        } => QueryType::Truncate,
        Statement::Drop {
            ..
        } => QueryType::Drop,
        Statement::CreateTable(_) => QueryType::Create,
        Statement::AttachDatabase {
            ..
        } => QueryType::Attach,
        Statement::Pragma {
            ..
        } => QueryType::Pragma,
        _ => QueryType::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_with_cte() {
        let queries = parse_queries(
            "WITH sixes AS (SELECT match_id FROM deliveries_db.deliveries WHERE batsman_runs = 6) \
             SELECT COUNT(*) FROM sixes",
            SqlDialect::SQLite
        )
        .unwrap();
        assert_eq!(queries.len(), 1);
        let q = &queries[0];
        assert_eq!(q.query_type, QueryType::Select);
        assert_eq!(q.cte_names, vec!["sixes".to_string()]);
        assert!(q.tables.contains(&"deliveries_db.deliveries".to_string()));
        assert!(q.tables.contains(&"sixes".to_string()));
    }

    #[test]
    fn test_classifies_mutations() {
        let queries = parse_queries(
            "DELETE FROM ipl_db.ipl; DROP TABLE ipl_db.ipl; INSERT INTO t VALUES (1)",
            SqlDialect::SQLite
        )
        .unwrap();
        let types: Vec<QueryType> = queries.iter().map(|q| q.query_type).collect();
        assert_eq!(
            types,
            vec![QueryType::Delete, QueryType::Drop, QueryType::Insert]
        );
    }

    #[test]
    fn test_empty_is_error() {
        assert!(parse_queries("  ;  ", SqlDialect::SQLite).is_err());
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_queries("I cannot answer that.", SqlDialect::SQLite).is_err());
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("SQLite".parse::<SqlDialect>().unwrap(), SqlDialect::SQLite);
        assert_eq!("duckdb".parse::<SqlDialect>().unwrap(), SqlDialect::DuckDb);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_subquery_relations_collected() {
        let queries = parse_queries(
            "SELECT winner FROM ipl_db.ipl WHERE id IN (SELECT match_id FROM deliveries_db.deliveries)",
            SqlDialect::SQLite
        )
        .unwrap();
        assert_eq!(queries[0].tables.len(), 2);
    }

    #[test]
    fn test_nested_cte_names_collected() {
        let queries = parse_queries(
            "SELECT COUNT(*) FROM (WITH s AS (SELECT id FROM ipl_db.ipl) SELECT id FROM s) t \
             WHERE t.id IN (WITH d AS (SELECT match_id FROM deliveries_db.deliveries) \
             SELECT match_id FROM d)",
            SqlDialect::SQLite
        )
        .unwrap();
        assert_eq!(
            queries[0].cte_names,
            vec!["s".to_string(), "d".to_string()]
        );
    }
}
