//! Static description of the two cricket tables.
//!
//! Each table lives in its own database file and is attached under a catalog
//! name at query time, so every reference has to be written as
//! `catalog.table`. The schema is used to render the prompt template, to
//! drive catalog qualification during repair, and as the table allow-list of
//! the statement guard.
//!
//! # Example
//!
//! ```
//! use ipl_sql::{config::DatabaseConfig, schema::Schema};
//!
//! let schema = Schema::cricket(&DatabaseConfig::default());
//! let matches = schema.table("ipl").unwrap();
//! assert_eq!(matches.qualified_name(), "ipl_db.ipl");
//! assert!(schema.to_summary().contains("deliveries_db.deliveries"));
//! ```

use std::path::PathBuf;

use crate::config::DatabaseConfig;

/// A table that is attached from its own database file.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Catalog name the file is attached under
    pub catalog:     String,
    /// Table name inside the file
    pub name:        String,
    /// Backing database file
    pub path:        PathBuf,
    /// One-line description used in the prompt
    pub description: String,
    /// Ordered list of columns
    pub columns:     Vec<ColumnInfo>
}

/// Column name and loader-inferred type.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name:      String,
    pub data_type: String
}

impl TableInfo {
    /// `catalog.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.catalog, self.name)
    }
}

/// The attached tables, in attachment order.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    pub tables: Vec<TableInfo>
}

const MATCH_COLUMNS: &[(&str, &str)] = &[
    ("id", "INTEGER"),
    ("season", "TEXT"),
    ("city", "TEXT"),
    ("date", "TEXT"),
    ("match_type", "TEXT"),
    ("player_of_match", "TEXT"),
    ("venue", "TEXT"),
    ("team1", "TEXT"),
    ("team2", "TEXT"),
    ("toss_winner", "TEXT"),
    ("toss_decision", "TEXT"),
    ("winner", "TEXT"),
    ("result", "TEXT"),
    ("result_margin", "REAL"),
    ("target_runs", "REAL"),
    ("target_overs", "REAL"),
    ("super_over", "TEXT"),
    ("method", "TEXT"),
    ("umpire1", "TEXT"),
    ("umpire2", "TEXT")
];

const DELIVERY_COLUMNS: &[(&str, &str)] = &[
    ("match_id", "INTEGER"),
    ("inning", "INTEGER"),
    ("batting_team", "TEXT"),
    ("bowling_team", "TEXT"),
    ("over", "INTEGER"),
    ("ball", "INTEGER"),
    ("batter", "TEXT"),
    ("bowler", "TEXT"),
    ("non_striker", "TEXT"),
    ("batsman_runs", "INTEGER"),
    ("extra_runs", "INTEGER"),
    ("total_runs", "INTEGER"),
    ("extras_type", "TEXT"),
    ("is_wicket", "INTEGER"),
    ("player_dismissed", "TEXT"),
    ("dismissal_kind", "TEXT"),
    ("fielder", "TEXT")
];

fn columns(list: &[(&str, &str)]) -> Vec<ColumnInfo> {
    list.iter()
        .map(|(name, data_type)| ColumnInfo {
            name:      name.to_string(),
            data_type: data_type.to_string()
        })
        .collect()
}

impl Schema {
    /// Match table `ipl` plus delivery table `deliveries`
    pub fn cricket(db: &DatabaseConfig) -> Self {
        Self {
            tables: vec![
                TableInfo {
                    catalog:     db.ipl_catalog.clone(),
                    name:        String::from("ipl"),
                    path:        db.ipl_path.clone(),
                    description: String::from("Match-level information, one row per match"),
                    columns:     columns(MATCH_COLUMNS)
                },
                TableInfo {
                    catalog:     db.deliveries_catalog.clone(),
                    name:        String::from("deliveries"),
                    path:        db.deliveries_path.clone(),
                    description: String::from("Ball-by-ball information, one row per delivery"),
                    columns:     columns(DELIVERY_COLUMNS)
                },
            ]
        }
    }

    /// Look up a table by its bare name (case-insensitive)
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is one of the catalog names
    pub fn is_catalog(&self, name: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.catalog.eq_ignore_ascii_case(name))
    }

    /// Generate a compact summary of the tables for LLM context
    pub fn to_summary(&self) -> String {
        let mut summary = String::new();
        for (i, table) in self.tables.iter().enumerate() {
            summary.push_str(&format!(
                "{}. {} ({})\n",
                i + 1,
                table.qualified_name(),
                table.description
            ));
            let cols: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.data_type))
                .collect();
            summary.push_str(&format!("   Columns: {}\n", cols.join(", ")));
        }
        summary
    }
}
