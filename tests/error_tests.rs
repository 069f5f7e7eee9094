// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use ipl_sql::error::{
    config_error, error_detail, execution_error, file_read_error, llm_api_error, load_error,
    query_parse_error, rejected_statement_error
};

#[test]
fn test_file_read_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error = file_read_error("/path/to/prompt.txt", io_error);
    let msg = error_detail(&error);
    assert!(msg.contains("/path/to/prompt.txt"));
}

#[test]
fn test_query_parse_error() {
    let error = query_parse_error("Unexpected token");
    let msg = error_detail(&error);
    assert!(msg.contains("Query parse error"));
}

#[test]
fn test_query_parse_error_with_position() {
    let error = query_parse_error("Expected: end of statement at Line: 3, Column: 25");
    let msg = error_detail(&error);
    assert!(msg.contains("line 3, column 25"));
}

#[test]
fn test_rejected_statement_error() {
    let error = rejected_statement_error("DROP statements are not allowed");
    assert!(error_detail(&error).starts_with("Rejected statement"));
}

#[test]
fn test_execution_error_keeps_engine_text() {
    let error = execution_error("no such column: wickets");
    assert_eq!(error_detail(&error), "no such column: wickets");
}

#[test]
fn test_load_error() {
    let error = load_error("bad row");
    assert!(error_detail(&error).contains("bad row"));
}

#[test]
fn test_error_types_are_different() {
    let llm_err = llm_api_error("test");
    let config_err = config_error("test");
    let query_err = query_parse_error("test");
    assert!(!llm_err.to_string().is_empty());
    assert!(!config_err.to_string().is_empty());
    assert!(!query_err.to_string().is_empty());
}
