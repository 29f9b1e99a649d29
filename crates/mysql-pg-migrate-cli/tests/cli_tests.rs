//! CLI integration tests for mysql-pg-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes; none of them touch a database.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the mysql-pg-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql-pg-migrate").unwrap()
}

/// The eight positional connection arguments.
const POSITIONALS: [&str; 8] = [
    "root", "secret", "mysql.local", "appdb", "postgres", "secret", "pg.local", "appdb",
];

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_positional_arguments() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MYSQL_USER"))
        .stdout(predicate::str::contains("MYSQL_HOST"))
        .stdout(predicate::str::contains("POSTGRES_USER"))
        .stdout(predicate::str::contains("POSTGRES_NAME"));
}

#[test]
fn test_help_shows_all_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--con"))
        .stdout(predicate::str::contains("--use-csv"))
        .stdout(predicate::str::contains("--repair"))
        .stdout(predicate::str::contains("--info"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_help_shows_ambient_flags_with_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--pg-sslmode"))
        .stdout(predicate::str::contains("[default: disable]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-pg-migrate"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_missing_positionals_fails() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_partial_positionals_fails() {
    cmd()
        .args(["root", "secret", "mysql.local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_repair_conflicts_with_info() {
    cmd()
        .args(POSITIONALS)
        .args(["--repair", "--info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_verbosity_rejected() {
    cmd()
        .args(POSITIONALS)
        .args(["--verbosity", "loud"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid verbosity"));
}

#[test]
fn test_invalid_log_format_rejected() {
    cmd()
        .args(POSITIONALS)
        .args(["--log-format", "xml"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid log format"));
}

#[test]
fn test_invalid_sslmode_rejected() {
    cmd()
        .args(POSITIONALS)
        .args(["--pg-sslmode", "perhaps"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_short_flags_accepted() {
    // Short flags parse; the run then fails on connectivity, not parsing.
    cmd()
        .args(POSITIONALS)
        .args(["-c", "-u"])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .failure()
        .stderr(predicate::str::contains("required").not());
}
