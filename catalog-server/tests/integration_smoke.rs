//! Smoke tests for startup behaviour

use assert_cmd::Command;
use predicates::prelude::*;

fn catalog_server(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("catalog-server").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .env_remove("ENVIRONMENT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_flags() {
    let dir = tempfile::tempdir().unwrap();
    catalog_server(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Address to bind to"))
        .stdout(predicate::str::contains("--check"));
}

#[test]
fn test_missing_database_url_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    catalog_server(&dir)
        .arg("--check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is not configured"));
}

#[test]
fn test_blank_database_url_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    catalog_server(&dir)
        .arg("--check")
        .env("DATABASE_URL", "  ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is not configured"));
}

#[test]
fn test_database_url_from_dotenv_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "DATABASE_URL=postgres://catalog@127.0.0.1:1/catalog\n",
    )
    .unwrap();

    // Config resolves from .env, then the probe fails against a closed port.
    catalog_server(&dir)
        .args(["--check", "--acquire-timeout-secs", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connectivity check failed"));
}

#[test]
fn test_unreachable_database_fails_check() {
    let dir = tempfile::tempdir().unwrap();
    catalog_server(&dir)
        .args([
            "--check",
            "--acquire-timeout-secs",
            "1",
            "--database-url",
            "postgres://catalog@127.0.0.1:1/catalog",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connectivity check failed"))
        .stdout(predicate::str::contains("Error connecting to the database"));
}
