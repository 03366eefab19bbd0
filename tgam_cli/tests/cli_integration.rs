use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// A complete config with small but valid analysis settings
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[serial]
baud_rate = 57600
parity = "none"
stop_bits = 1
read_timeout_ms = 50

[analysis]
sample_rate_hz = 512
buffer_size = 512
batch_size = 32
raw_history = 256
fallback_interval_ms = 100

[reader]
poll_interval_ms = 5
open_retries = 1
retry_backoff_ms = 0
probe_timeout_ms = 20
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "ok", "stdout")]
#[case(&["decode"], 2, "required", "stderr")]
#[case(&["stream", "--port", "no-such-port-xyz"], 4, "does not exist", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("tgam").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn self_check_works_without_a_config_file() {
    Command::cargo_bin("tgam")
        .unwrap()
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[rstest]
#[case("[analysis]\nbatch_size = 0\n", "Configuration is invalid")]
#[case("[analysis]\nbatch_size = 600\nbuffer_size = 500\n", "must not exceed")]
#[case("[reader]\nopen_retries = 0\n", "open_retries")]
#[case("[logging]\nrotation = \"weekly\"\n", "never|daily|hourly")]
#[case("[serial\nbaud_rate = 1\n", "could not be loaded")]
fn bad_config_is_reported(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("tgam")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("tgam")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not be loaded"));
}

#[test]
fn json_errors_carry_connection_kind() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("tgam")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("stream")
        .arg("--port")
        .arg("no-such-port-xyz")
        .assert()
        .code(4)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_else(|| panic!("no JSON error line; stderr was: {stderr}"));
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Connection");
    assert_eq!(v["kind"], "not-found");
    assert!(
        v["details"]["driver_message"]
            .as_str()
            .unwrap()
            .contains("no-such-port-xyz")
    );
}

#[test]
fn ports_json_is_an_array() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("tgam")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("ports")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert!(v.is_array(), "expected array, got {stdout}");
}
