//! CLI smoke tests for mksfx.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// A command running inside `dir`, so no stray `mksfx.toml` is picked up.
fn mksfx(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("mksfx");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    mksfx(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("verify"));
}

#[test]
fn version_prints_crate_version() {
    let dir = TempDir::new().unwrap();
    mksfx(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn init_build_verify_info() {
    let dir = TempDir::new().unwrap();

    mksfx(&dir)
        .args(["init", "myapp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("myapp"));
    fs::write(dir.path().join("myapp/files/app.conf"), "mode=1\n").unwrap();

    mksfx(&dir)
        .args(["build", "myapp", "-o", "myapp-2.0.0.tar.gz", "--version", "2.0.0", "-m", "Vendor=ACME"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle created"))
        .stdout(predicate::str::contains("2.0.0"));

    mksfx(&dir)
        .args(["verify", "myapp-2.0.0.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle verified"));

    mksfx(&dir)
        .args(["info", "myapp-2.0.0.tar.gz", "--files"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vendor"))
        .stdout(predicate::str::contains("files/app.conf"));
}

#[test]
fn config_file_supplies_defaults() {
    let dir = TempDir::new().unwrap();
    mksfx(&dir).args(["init", "app"]).assert().success();
    fs::write(
        dir.path().join("mksfx.toml"),
        "[build]\nversion = \"7.0.0\"\noutput = \"from-config.tar.gz\"\n",
    )
    .unwrap();

    mksfx(&dir).args(["build", "app"]).assert().success();

    assert!(dir.path().join("from-config.tar.gz").is_file());
    mksfx(&dir)
        .args(["--json", "info", "from-config.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\": \"7.0.0\""));
}

#[test]
fn update_between_builds() {
    let dir = TempDir::new().unwrap();
    mksfx(&dir).args(["init", "app"]).assert().success();
    mksfx(&dir)
        .args(["build", "app", "-o", "app-1.0.0.tar.gz", "--version", "1.0.0"])
        .assert()
        .success();
    fs::write(dir.path().join("app/files/new.txt"), "new").unwrap();
    mksfx(&dir)
        .args(["build", "app", "-o", "app-1.1.0.tar.gz", "--version", "1.1.0"])
        .assert()
        .success();

    mksfx(&dir)
        .args(["update", "app-1.0.0.tar.gz", "app-1.1.0.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+ files/new.txt"));

    assert!(dir.path().join("update-1.0.0-to-1.1.0.tar.gz").is_file());
}

#[test]
fn build_failure_exits_with_build_status() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();

    mksfx(&dir)
        .args(["build", "empty"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bootstrap.sh"));

    assert!(!dir.path().join("installer.tar.gz").exists());
}

#[test]
fn update_failure_exits_with_update_status() {
    let dir = TempDir::new().unwrap();

    mksfx(&dir)
        .args(["update", "old.tar.gz", "new.tar.gz"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("old archive not found"));
}

#[test]
fn verify_failure_exits_with_validation_status() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("junk.tar.gz"), "not an archive").unwrap();

    mksfx(&dir).args(["verify", "junk.tar.gz"]).assert().code(4);
}

#[test]
fn init_refuses_existing_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("taken")).unwrap();

    mksfx(&dir)
        .args(["init", "taken"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}
