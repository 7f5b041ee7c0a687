//! CLI integration tests for sde-pg-export.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for errors raised before any database is contacted.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the sde-pg-export binary.
fn cmd() -> Command {
    Command::cargo_bin("sde-pg-export").unwrap()
}

const VALID_CONFIG: &str = r#"
source:
  host: sde.example.com
  database: gisdata
  user: reader
  password: secret
target:
  host: postgis.example.com
  database: warehouse
  user: loader
  password: secret
"#;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_export_subcommand_help() {
    cmd()
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<SOURCE_TABLE>"))
        .stdout(predicate::str::contains("<DEST_SCHEMA>"))
        .stdout(predicate::str::contains("[BUFFER_SIZE]"))
        .stdout(predicate::str::contains("[SRID]"))
        .stdout(predicate::str::contains("--detect-spatial-type"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sde-pg-export"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_config_flag_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// Argument Parsing Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_export_requires_table_and_schema() {
    cmd()
        .args(["export", "ROADS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<DEST_SCHEMA>"));
}

#[test]
fn test_export_rejects_non_numeric_buffer_size() {
    cmd()
        .args(["export", "ROADS", "public", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// =============================================================================
// Config Error Tests
// =============================================================================

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["-c", "/nonexistent/config.yaml", "health-check"])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_config() {
    let file = config_file("source: [unclosed\n");

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_empty_config_file() {
    let file = config_file("");

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_missing_required_fields() {
    let file = config_file("source:\n  host: sde.example.com\n");

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_same_source_and_target_rejected() {
    let file = config_file(
        r#"
source:
  host: db.example.com
  port: 5432
  database: gis
  user: reader
target:
  host: db.example.com
  port: 5432
  database: gis
  user: loader
"#,
    );

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("same database"));
}

#[test]
fn test_invalid_ssl_mode_rejected() {
    let file = config_file(&format!("{}  ssl_mode: sometimes\n", VALID_CONFIG));

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .code(1);
}

// =============================================================================
// Export Request Tests
// =============================================================================

#[test]
fn test_export_without_srid_fails() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "export", "ROADS", "public"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no SRID given"));
}

#[test]
fn test_export_with_zero_buffer_fails() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args([
            "-c",
            file.path().to_str().unwrap(),
            "export",
            "ROADS",
            "public",
            "0",
            "4326",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("buffer size"));
}

#[test]
fn test_negative_srid_in_config_rejected() {
    let file = config_file(&format!("{}export:\n  srid: -4326\n", VALID_CONFIG));

    cmd()
        .args(["-c", file.path().to_str().unwrap(), "export", "ROADS", "public"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("export.srid"));
}
