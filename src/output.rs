use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::{load::LoadReport, service::Answer};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true
        }
    }
}

/// SQL produced without execution
#[derive(Debug, Serialize)]
struct DryRun<'a> {
    generated_sql: &'a str
}

fn serialize<T: Serialize>(value: &T, format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Json => Some(serde_json::to_string_pretty(value).unwrap_or_default()),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value).unwrap_or_default()),
        OutputFormat::Text => None
    }
}

fn heading(text: &str, opts: &OutputOptions) -> String {
    if opts.colored {
        text.cyan().bold().to_string()
    } else {
        text.to_string()
    }
}

/// Format an answered question
pub fn format_answer(answer: &Answer, opts: &OutputOptions) -> String {
    if let Some(serialized) = serialize(answer, opts.format) {
        return serialized;
    }
    let mut output = String::new();
    output.push_str(&heading("Generated SQL:", opts));
    output.push('\n');
    output.push_str(&answer.generated_sql);
    output.push_str("\n\n");
    output.push_str(&heading("Result:", opts));
    output.push('\n');
    output.push_str(&format_table(&answer.columns, &answer.result));
    let count = answer.result.len();
    output.push_str(&format!(
        "({} row{}{})\n",
        count,
        if count == 1 { "" } else { "s" },
        if answer.truncated { ", truncated" } else { "" }
    ));
    output
}

/// Format SQL that was generated but not executed
pub fn format_dry_run(sql: &str, opts: &OutputOptions) -> String {
    if let Some(serialized) = serialize(
        &DryRun {
            generated_sql: sql
        },
        opts.format
    ) {
        return serialized;
    }
    format!("{}\n{}\n", heading("Generated SQL:", opts), sql)
}

/// Format the outcome of a CSV load
pub fn format_load_report(report: &LoadReport, opts: &OutputOptions) -> String {
    if let Some(serialized) = serialize(report, opts.format) {
        return serialized;
    }
    let mut output = String::new();
    let status = if report.created {
        format!(
            "Loaded {} rows into {} ({})",
            report.rows_inserted,
            report.table,
            report.db_path.display()
        )
    } else {
        format!(
            "Table {} already exists in {}, nothing loaded",
            report.table,
            report.db_path.display()
        )
    };
    if opts.colored {
        let status = if report.created { status.green() } else { status.yellow() };
        output.push_str(&status.to_string());
    } else {
        output.push_str(&status);
    }
    output.push_str("\n\n");
    output.push_str(&heading("Columns:", opts));
    output.push('\n');
    for column in &report.columns {
        output.push_str(&format!("  {} {}\n", column.name, column.column_type));
    }
    output.push('\n');
    output.push_str(&heading("Sample:", opts));
    output.push('\n');
    let names: Vec<String> = report.columns.iter().map(|c| c.name.clone()).collect();
    output.push_str(&format_table(&names, &report.sample));
    output
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("NULL"),
        Value::String(s) => s.clone(),
        other => other.to_string()
    }
}

/// Plain text grid with a header rule
pub fn format_table(columns: &[String], rows: &[Vec<Value>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(value.chars().count());
            }
        }
    }
    let line = |values: &[String]| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };
    let mut output = line(columns);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&format!("{}\n", rule.join("-+-")));
    for row in &cells {
        output.push_str(&line(row));
    }
    output
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn plain() -> OutputOptions {
        OutputOptions {
            format:  OutputFormat::Text,
            colored: false
        }
    }

    fn answer() -> Answer {
        Answer {
            generated_sql: "SELECT winner, COUNT(*) AS wins FROM ipl_db.ipl GROUP BY winner".into(),
            columns:       vec!["winner".into(), "wins".into()],
            result:        vec![vec![json!("Mumbai Indians"), json!(5)], vec![Value::Null, json!(1)]],
            truncated:     false
        }
    }

    #[test]
    fn test_table_alignment() {
        let table = format_table(&["a".to_string(), "bb".to_string()], &[vec![
            json!("long value"),
            json!(1)
        ]]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "a          | bb");
        assert_eq!(lines[1], "-----------+---");
        assert_eq!(lines[2], "long value | 1");
    }

    #[test]
    fn test_text_answer() {
        let text = format_answer(&answer(), &plain());
        assert!(text.starts_with("Generated SQL:\nSELECT winner"));
        assert!(text.contains("Mumbai Indians | 5"));
        assert!(text.contains("NULL"));
        assert!(text.ends_with("(2 rows)\n"));
    }

    #[test]
    fn test_json_answer() {
        let opts = OutputOptions {
            format:  OutputFormat::Json,
            colored: false
        };
        let parsed: Value = serde_json::from_str(&format_answer(&answer(), &opts)).unwrap();
        assert_eq!(parsed["result"][0][0], "Mumbai Indians");
        assert!(parsed["generated_sql"].as_str().unwrap().contains("ipl_db.ipl"));
    }

    #[test]
    fn test_yaml_dry_run() {
        let opts = OutputOptions {
            format:  OutputFormat::Yaml,
            colored: false
        };
        assert_eq!(format_dry_run("SELECT 1", &opts), "generated_sql: SELECT 1\n");
    }
}
