//! CSV import into the backing database files.
//!
//! Each CSV becomes one table in its own SQLite file. Column types are
//! inferred from the data so numeric comparisons such as
//! `batsman_runs = 6` behave as expected once attached.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf}
};

use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    config::is_plain_identifier,
    error::{AppResult, file_read_error, load_error},
    executor::json_value_from_sql
};

const SAMPLE_ROWS: usize = 5;

/// Storage class inferred for a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Real => write!(f, "REAL"),
            Self::Text => write!(f, "TEXT")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedColumn {
    pub name:        String,
    pub column_type: ColumnType
}

/// Outcome of a load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub table:         String,
    pub db_path:       PathBuf,
    pub columns:       Vec<LoadedColumn>,
    /// False when the table already existed and was left untouched
    pub created:       bool,
    pub rows_inserted: usize,
    /// First rows as stored
    pub sample:        Vec<Vec<Value>>
}

/// Load `csv_path` into table `table` of the SQLite file at `db_path`.
///
/// The file is created if missing. An existing table is kept as is and only
/// sampled.
///
/// # Errors
///
/// - invalid table name or empty column header
/// - unreadable or malformed CSV
/// - database errors while creating or filling the table
pub fn load_csv(csv_path: &Path, db_path: &Path, table: &str) -> AppResult<LoadReport> {
    if !is_plain_identifier(table) {
        return Err(load_error(format!(
            "Table name '{}' must be a plain identifier",
            table
        )));
    }
    let (headers, records) = read_csv(csv_path)?;
    let columns: Vec<LoadedColumn> = headers
        .iter()
        .enumerate()
        .map(|(index, name)| LoadedColumn {
            name:        name.clone(),
            column_type: infer_type(records.iter().map(|r| r.get(index).unwrap_or("")))
        })
        .collect();

    let mut connection = Connection::open(db_path).map_err(|e| {
        load_error(format!("Failed to open '{}': {}", db_path.display(), e))
    })?;
    let created = !table_exists(&connection, table)?;
    let mut rows_inserted = 0;
    if created {
        rows_inserted = create_and_fill(&mut connection, table, &columns, &records)?;
        info!(table, rows = rows_inserted, "table loaded");
    } else {
        warn!(table, "table already exists, leaving it untouched");
    }
    let sample = sample_rows(&connection, table)?;
    Ok(LoadReport {
        table: table.to_string(),
        db_path: db_path.to_path_buf(),
        columns,
        created,
        rows_inserted,
        sample
    })
}

fn read_csv(path: &Path) -> AppResult<(Vec<String>, Vec<csv::StringRecord>)> {
    let file = File::open(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| load_error(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if let Some(position) = headers.iter().position(String::is_empty) {
        return Err(load_error(format!(
            "Column {} has an empty header",
            position + 1
        )));
    }
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| load_error(e.to_string()))?;
    Ok((headers, records))
}

/// INTEGER if every non-empty value is an i64, REAL if every one is an f64,
/// TEXT otherwise (including all-empty columns)
fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let mut column_type = ColumnType::Integer;
    for value in values.filter(|v| !v.is_empty()) {
        seen = true;
        if column_type == ColumnType::Integer && value.parse::<i64>().is_err() {
            column_type = ColumnType::Real;
        }
        if column_type == ColumnType::Real && value.parse::<f64>().is_err() {
            return ColumnType::Text;
        }
    }
    if seen { column_type } else { ColumnType::Text }
}

fn convert(value: &str, column_type: ColumnType) -> SqlValue {
    if value.is_empty() {
        return SqlValue::Null;
    }
    match column_type {
        ColumnType::Integer => value
            .parse()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(value.to_string())),
        ColumnType::Real => value
            .parse()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(value.to_string())),
        ColumnType::Text => SqlValue::Text(value.to_string())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_exists(connection: &Connection, table: &str) -> AppResult<bool> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0)
        )
        .map(|count| count > 0)
        .map_err(|e| load_error(e.to_string()))
}

fn create_and_fill(
    connection: &mut Connection,
    table: &str,
    columns: &[LoadedColumn],
    records: &[csv::StringRecord]
) -> AppResult<usize> {
    let definitions: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type))
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let tx = connection
        .transaction()
        .map_err(|e| load_error(e.to_string()))?;
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({});",
        table,
        definitions.join(", ")
    ))
    .map_err(|e| load_error(e.to_string()))?;
    {
        let mut insert = tx
            .prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))
            .map_err(|e| load_error(e.to_string()))?;
        for (line, record) in records.iter().enumerate() {
            let values = columns
                .iter()
                .enumerate()
                .map(|(index, c)| convert(record.get(index).unwrap_or(""), c.column_type));
            insert
                .execute(params_from_iter(values))
                .map_err(|e| load_error(format!("Row {}: {}", line + 1, e)))?;
        }
    }
    tx.commit().map_err(|e| load_error(e.to_string()))?;
    Ok(records.len())
}

fn sample_rows(connection: &Connection, table: &str) -> AppResult<Vec<Vec<Value>>> {
    let mut statement = connection
        .prepare(&format!("SELECT * FROM {} LIMIT {}", table, SAMPLE_ROWS))
        .map_err(|e| load_error(e.to_string()))?;
    let width = statement.column_count();
    let rows = statement
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i).map(json_value_from_sql))
                .collect::<Result<Vec<_>, _>>()
        })
        .map_err(|e| load_error(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| load_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn write_csv(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("deliveries.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(infer_type(["1", "", "42"].into_iter()), ColumnType::Integer);
        assert_eq!(infer_type(["1", "2.5"].into_iter()), ColumnType::Real);
        assert_eq!(infer_type(["1", "six"].into_iter()), ColumnType::Text);
        assert_eq!(infer_type(["", ""].into_iter()), ColumnType::Text);
    }

    #[test]
    fn test_load_infers_numeric_columns() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "match_id,batter,batsman_runs,extras_type\n1,SC Ganguly,6,\n1,BB McCullum,4,wides\n"
        );
        let db = dir.path().join("deliveries.db");
        let report = load_csv(&csv, &db, "deliveries").unwrap();
        assert!(report.created);
        assert_eq!(report.rows_inserted, 2);
        assert_eq!(report.columns[2].column_type, ColumnType::Integer);
        assert_eq!(report.sample[0], vec![json!(1), json!("SC Ganguly"), json!(6), Value::Null]);

        let conn = Connection::open(&db).unwrap();
        let sixes: i64 = conn
            .query_row("SELECT COUNT(*) FROM deliveries WHERE batsman_runs = 6", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sixes, 1);
    }

    #[test]
    fn test_existing_table_is_kept() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(&dir, "id,season\n1,2008\n");
        let db = dir.path().join("ipl.db");
        load_csv(&csv, &db, "ipl").unwrap();
        let again = load_csv(&csv, &db, "ipl").unwrap();
        assert!(!again.created);
        assert_eq!(again.rows_inserted, 0);
        assert_eq!(again.sample.len(), 1);
    }

    #[test]
    fn test_sample_is_capped() {
        let dir = TempDir::new().unwrap();
        let body: String = std::iter::once("n\n".to_string())
            .chain((0..8).map(|i| format!("{}\n", i)))
            .collect();
        let csv = write_csv(&dir, &body);
        let report = load_csv(&csv, &dir.path().join("n.db"), "numbers").unwrap();
        assert_eq!(report.rows_inserted, 8);
        assert_eq!(report.sample.len(), SAMPLE_ROWS);
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(&dir, "a\n1\n");
        assert!(load_csv(&csv, &dir.path().join("x.db"), "x; DROP TABLE y").is_err());
    }

    #[test]
    fn test_missing_csv() {
        let dir = TempDir::new().unwrap();
        assert!(load_csv(&dir.path().join("nope.csv"), &dir.path().join("x.db"), "t").is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
