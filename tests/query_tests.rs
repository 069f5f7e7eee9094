use ipl_sql::query::{QueryType, SqlDialect, parse_queries};

#[test]
fn test_parse_qualified_select() {
    let sql = "SELECT winner FROM ipl_db.ipl WHERE SUBSTR(season, 1, 4) = '2008'";
    let queries = parse_queries(sql, SqlDialect::SQLite).unwrap();

    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].query_type, QueryType::Select);
    assert_eq!(queries[0].tables, vec!["ipl_db.ipl".to_string()]);
    assert!(queries[0].is_read_only());
}

#[test]
fn test_parse_join() {
    let sql = "SELECT m.winner, COUNT(*) FROM ipl_db.ipl m \
               JOIN deliveries_db.deliveries d ON m.id = d.match_id GROUP BY m.winner";
    let queries = parse_queries(sql, SqlDialect::SQLite).unwrap();

    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].tables.len(), 2);
}

#[test]
fn test_parse_multiple_queries() {
    let sql = "SELECT * FROM ipl_db.ipl; SELECT * FROM deliveries_db.deliveries;";
    let queries = parse_queries(sql, SqlDialect::SQLite).unwrap();

    assert_eq!(queries.len(), 2);
}

#[test]
fn test_parse_update_is_not_read_only() {
    let sql = "UPDATE ipl_db.ipl SET winner = 'x'";
    let queries = parse_queries(sql, SqlDialect::SQLite).unwrap();

    assert_eq!(queries[0].query_type, QueryType::Update);
    assert!(!queries[0].is_read_only());
}

#[test]
fn test_parse_pragma() {
    let queries = parse_queries("PRAGMA table_info(ipl)", SqlDialect::SQLite).unwrap();
    assert_eq!(queries[0].query_type, QueryType::Pragma);
}

#[test]
fn test_parse_duckdb_dialect() {
    let queries = parse_queries(
        "SELECT COUNT(*) FROM deliveries_db.deliveries WHERE batsman_runs = 6",
        SqlDialect::DuckDb
    )
    .unwrap();
    assert_eq!(queries[0].query_type, QueryType::Select);
}

#[test]
fn test_parse_invalid_sql() {
    let result = parse_queries("SELEC winner FORM ipl", SqlDialect::SQLite);
    assert!(result.is_err());
}

#[test]
fn test_query_type_display() {
    assert_eq!(QueryType::Delete.to_string(), "DELETE");
    assert_eq!(QueryType::Select.to_string(), "SELECT");
}
