//! Integration tests for the ipl-sql binary.

use std::fs;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("ipl-sql");
    cmd.env_remove("LLM_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("LLM_PROVIDER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_prompt_prints_rules() {
    let dir = TempDir::new().unwrap();
    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("prompt")
        .assert()
        .success()
        .stdout(predicate::str::contains("SUBSTR(season, 1, 4)"))
        .stdout(predicate::str::contains("ipl_db.ipl.id = deliveries_db.deliveries.match_id"));
}

#[test]
fn test_prompt_uses_custom_template() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("prompt.txt"), "Answer in SQL only.\n").unwrap();
    fs::write(
        dir.path().join(".ipl-sql.toml"),
        "[prompt]\ntemplate_path = \"prompt.txt\"\n"
    )
    .unwrap();
    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("prompt")
        .assert()
        .success()
        .stdout("Answer in SQL only.\n");
}

#[test]
fn test_load_csv() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("deliveries.csv");
    fs::write(&csv, "match_id,batsman_runs\n1,6\n1,4\n2,6\n").unwrap();
    let db = dir.path().join("deliveries.db");

    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args([
            "load",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--table",
            "deliveries",
            "--no-color"
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 3 rows into deliveries"))
        .stdout(predicate::str::contains("batsman_runs INTEGER"));
    assert!(db.exists());
}

#[test]
fn test_load_json_format() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("ipl.csv");
    fs::write(&csv, "id,season\n1,2007/08\n").unwrap();

    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args([
            "load",
            csv.to_str().unwrap(),
            "--db",
            dir.path().join("ipl.db").to_str().unwrap(),
            "--table",
            "ipl",
            "-f",
            "json"
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows_inserted\": 1"));
}

#[test]
fn test_load_file_not_found() {
    let dir = TempDir::new().unwrap();
    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args([
            "load",
            "/nonexistent/deliveries.csv",
            "--db",
            dir.path().join("x.db").to_str().unwrap(),
            "--table",
            "deliveries"
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_ask_without_key_fails() {
    let dir = TempDir::new().unwrap();
    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["ask", "How many matches were played in 2008?", "--provider", "gemini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key required"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".ipl-sql.toml"),
        "[database]\nipl_catalog = \"bad name\"\n"
    )
    .unwrap();
    cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("prompt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("plain identifier"));
}
