//! CLI options interaction tests
//!
//! These run the `nsp` binary with flags that never touch the network.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const ENV_VARS: [&str; 7] = [
    "PROBE_URL",
    "PROBE_SIZE_BYTES",
    "PROBE_INTERVAL_SECONDS",
    "PROBE_TIMEOUT_SECONDS",
    "RESULTS_DIR",
    "MAX_RESULTS",
    "ENABLE_COLOR",
];

/// Command isolated from the caller's environment and any `.env` file
fn create_test_cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nsp").unwrap();
    cmd.current_dir(workdir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn seed_log(dir: &TempDir, blob: &str) {
    fs::write(dir.path().join("throttleTestData.json"), blob).unwrap();
}

#[test]
fn test_help_lists_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--interval"))
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("--data-dir"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_env_help() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PROBE_URL"))
        .stdout(predicate::str::contains("MAX_RESULTS"));
}

#[test]
fn test_invalid_interval_values() {
    let dir = TempDir::new().unwrap();
    for value in ["0", "-5", "abc", "+3", "0x10"] {
        create_test_cmd(&dir)
            .args(["--interval", value, "--history"])
            .assert()
            .failure()
            .code(2);
    }
}

#[test]
fn test_conflicting_flags() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--history", "--clear"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--history and --clear"));

    create_test_cmd(&dir)
        .args(["--once", "--runs", "3"])
        .assert()
        .failure()
        .code(2);

    create_test_cmd(&dir)
        .args(["--runs", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_invalid_url_is_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--url", "ftp://example.com/file", "--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("http or https"));
}

#[test]
fn test_invalid_env_value_is_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("MAX_RESULTS", "lots")
        .args(["--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("MAX_RESULTS"));
}

#[test]
fn test_history_on_empty_store() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored results"))
        .stdout(predicate::str::contains("Average speed: -- Mbps"));
}

#[test]
fn test_history_shows_stored_log() {
    let dir = TempDir::new().unwrap();
    seed_log(
        &dir,
        r#"[{"timestamp":1700000000000,"speedMbps":4.0,"dataDownloadedMB":10,"totalDownloadedMB":10},
            {"timestamp":1700000005000,"speedMbps":6.0,"dataDownloadedMB":10,"totalDownloadedMB":20}]"#,
    );

    create_test_cmd(&dir)
        .args(["--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2023-11-14 22:13:20"))
        .stdout(predicate::str::contains("Total downloaded: 20.00 MB"))
        .stdout(predicate::str::contains("Average speed: 5.00 Mbps"));
}

#[test]
fn test_history_discards_corrupt_log() {
    let dir = TempDir::new().unwrap();
    seed_log(&dir, "this is not json");

    create_test_cmd(&dir)
        .args(["--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored results"))
        .stderr(predicate::str::contains("Stored data is corrupted"));

    assert!(!dir.path().join("throttleTestData.json").exists());
}

#[test]
fn test_history_skips_unreadable_record() {
    let dir = TempDir::new().unwrap();
    seed_log(
        &dir,
        r#"[{"timestamp":1,"speedMbps":4.0,"dataDownloadedMB":10,"totalDownloadedMB":10},
            {"timestamp":2,"speedMbps":6.0,"dataDownloadedMB":10,"totalDownloadedMB":20},
            {"timestamp":3,"speedMbps":null,"dataDownloadedMB":10,"totalDownloadedMB":30}]"#,
    );

    create_test_cmd(&dir)
        .args(["--history", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total downloaded: 20.00 MB"))
        .stdout(predicate::str::contains("Average speed: 5.00 Mbps"))
        .stderr(predicate::str::contains("Skipping unreadable stored measurement"));

    assert!(dir.path().join("throttleTestData.json").exists());
}

#[test]
fn test_clear_removes_log() {
    let dir = TempDir::new().unwrap();
    seed_log(
        &dir,
        r#"[{"timestamp":1,"speedMbps":4.0,"dataDownloadedMB":10,"totalDownloadedMB":10}]"#,
    );

    create_test_cmd(&dir)
        .args(["--clear", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared stored results"));

    assert!(!dir.path().join("throttleTestData.json").exists());

    // Clearing an empty store is fine too
    create_test_cmd(&dir)
        .args(["--clear", "--no-color"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn test_results_dir_from_env_file() {
    let dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        format!("RESULTS_DIR={}\n", data.path().display()),
    )
    .unwrap();
    fs::write(
        data.path().join("throttleTestData.json"),
        r#"[{"timestamp":1,"speedMbps":7.5,"dataDownloadedMB":10,"totalDownloadedMB":10}]"#,
    )
    .unwrap();

    create_test_cmd(&dir)
        .args(["--history", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Average speed: 7.50 Mbps"));
}
