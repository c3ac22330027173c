//! Smoke tests -- verify the binary runs and the offline subcommands work.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    Command::cargo_bin("podbench")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("network benchmarks for Kubernetes"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("podbench")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("podbench"));
}

#[test]
fn test_run_subcommand_exists() {
    Command::cargo_bin("podbench")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--keep-namespace"));
}

#[test]
fn test_plan_prints_pipelines_with_placeholders() {
    Command::cargo_bin("podbench")
        .unwrap()
        .args(["plan", "--suite", "netperf", "--topology", "inter"])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("netperf-remote-server")
                .and(predicates::str::contains("-t TCP_CRR -- -P 10002"))
                .and(predicates::str::contains("<svc-ip>"))
                .and(predicates::str::contains("netperf-local-server").not()),
        );
}

#[test]
fn test_plan_rejects_unknown_topology() {
    Command::cargo_bin("podbench")
        .unwrap()
        .args(["plan", "--topology", "2"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid topology classification"));
}

#[test]
fn test_run_with_missing_config_fails_before_cluster() {
    Command::cargo_bin("podbench")
        .unwrap()
        .args(["run", "--config", "/nonexistent/podbench.toml"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to read config file"));
}

#[test]
fn test_broken_env_config_is_reported_before_fallback() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("podbench.toml");
    std::fs::write(&path, "[timeouts]\nreadiness_sec = \"soon\"\n").unwrap();

    // An invalid topology stops the run right after the config is loaded.
    Command::cargo_bin("podbench")
        .unwrap()
        .env("PODBENCH_CONFIG", &path)
        .env_remove("RUST_LOG")
        .args(["run", "--topology", "2"])
        .assert()
        .failure()
        .stderr(
            predicates::str::contains("PODBENCH_CONFIG set but file could not be loaded")
                .and(predicates::str::contains("invalid topology classification")),
        );
}
