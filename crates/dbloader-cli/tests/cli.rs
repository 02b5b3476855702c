//! Argument parsing, configuration and input errors of the `dbloader` binary.
//!
//! None of these reach a database: every failure happens before connecting.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const DB_ENV: [(&str, &str); 5] = [
    ("DB_HOST", "127.0.0.1"),
    ("DB_PORT", "1"),
    ("DB_NAME", "app"),
    ("DB_USER", "loader"),
    ("DB_PASSWORD", "secret"),
];

/// Run the binary in an empty directory with a clean environment, so no
/// stray `.env` or DB_* variables leak in.
fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dbloader").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

fn cmd_with_db(dir: &TempDir) -> Command {
    let mut cmd = cmd(dir);
    cmd.envs(DB_ENV);
    cmd
}

#[test]
fn test_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--operation"))
        .stdout(predicate::str::contains("--table_name"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("[default: ,]"));
}

#[test]
fn test_missing_operation_is_usage_error() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--operation"));
}

#[test]
fn test_unknown_operation_is_usage_error() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["--operation", "drop-everything"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("create-schema"));
}

#[test]
fn test_load_csv_without_table_is_usage_error() {
    let dir = TempDir::new().unwrap();
    cmd_with_db(&dir)
        .args(["--operation", "load-csv", "--file", "sample.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--table_name"));
}

#[test]
fn test_missing_environment_reported_together() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["--operation", "create-schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "missing required environment variables: DB_HOST, DB_PORT, DB_NAME, DB_USER, DB_PASSWORD",
        ));
}

#[test]
fn test_env_file_is_read() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        "DB_HOST=127.0.0.1\nDB_PORT=1\nDB_NAME=app\nDB_USER=loader\n",
    )
    .unwrap();

    cmd(&dir)
        .args(["--operation", "create-schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "missing required environment variables: DB_PASSWORD",
        ));
}

#[test]
fn test_invalid_port() {
    let dir = TempDir::new().unwrap();
    cmd_with_db(&dir)
        .env("DB_PORT", "postgres")
        .args(["--operation", "create-schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_PORT"));
}

#[test]
fn test_load_csv_needs_storage_path() {
    let dir = TempDir::new().unwrap();
    cmd_with_db(&dir)
        .args([
            "--operation",
            "load-csv",
            "--table_name",
            "sample_table1",
            "--file",
            "sample.csv",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("STORAGE_PATH"));
}

#[test]
fn test_load_csv_missing_file() {
    let dir = TempDir::new().unwrap();
    cmd_with_db(&dir)
        .env("STORAGE_PATH", dir.path())
        .args([
            "--operation",
            "load-csv",
            "--table_name",
            "sample_table1",
            "--file",
            "nope.csv",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse"))
        .stderr(predicate::str::contains("nope.csv"));
}

#[test]
fn test_load_csv_rejects_duplicate_header_before_connecting() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dup.csv"), "id,name,id\n1,a,2\n").unwrap();

    cmd_with_db(&dir)
        .env("STORAGE_PATH", dir.path())
        .args([
            "--operation",
            "load-csv",
            "--table_name",
            "sample_table1",
            "--file",
            "dup.csv",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("header names column `id` twice"))
        .stderr(predicate::str::contains("failed to connect").not());
}

#[test]
fn test_password_never_printed() {
    let dir = TempDir::new().unwrap();
    cmd_with_db(&dir)
        .args(["--operation", "create-schema", "--verbose"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to connect to loader@127.0.0.1:1/app"))
        .stderr(predicate::str::contains("secret").not());
}
