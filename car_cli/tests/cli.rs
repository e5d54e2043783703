use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Simulated backend: pins are validated but never opened
const VALID: &str = r#"
[vehicle]
number_of_magnets = 2
wheel_diameter_cm = 6.35

[pins]
forward_pos = 17
forward_neg = 27
backward_pos = 23
backward_neg = 24
magnet = 25

[motion]
interlock_ms = 5
coast_settle_ms = 100
stop_ack_timeout_ms = 1000
"#;

fn write_config(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("car.toml");
    fs::write(&path, text).unwrap();
    path
}

fn car() -> Command {
    let mut cmd = Command::cargo_bin("car").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run `serve --stdio` over `input` and return the reply lines.
fn session(input: &str) -> Vec<String> {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let out = car()
        .arg("--config")
        .arg(&cfg)
        .args(["--log-level", "warn", "serve", "--stdio"])
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

fn payload(line: &str) -> serde_json::Value {
    let payload = line.split('$').nth(1).unwrap();
    serde_json::from_str(payload).unwrap()
}

#[test]
fn help_lists_subcommands() {
    car()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve").and(predicate::str::contains("self-check")));
}

#[test]
fn self_check_reports_static_status() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    car()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 2 magnet(s), wheel 6.35 cm"));
}

#[test]
fn self_check_json_is_machine_readable() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let out = car()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "--log-level", "error", "self-check"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["number_of_magnets"], 2);
    assert_eq!(v["wheel_diameter"], 6.35);
}

#[test]
fn sample_config_passes_self_check() {
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../etc/car_config.toml");
    car()
        .arg("--config")
        .arg(sample)
        .arg("self-check")
        .assert()
        .success();
}

#[rstest]
#[case::zero_magnets(
    "[vehicle]\nnumber_of_magnets = 0\nwheel_diameter_cm = 6.35\n[pins]\nforward_pos = 17\nforward_neg = 27\nbackward_pos = 23\nbackward_neg = 24\nmagnet = 25\n",
    "number_of_magnets"
)]
#[case::shared_pin(
    "[vehicle]\nnumber_of_magnets = 2\nwheel_diameter_cm = 6.35\n[pins]\nforward_pos = 17\nforward_neg = 17\nbackward_pos = 23\nbackward_neg = 24\nmagnet = 25\n",
    "duplicates"
)]
#[case::missing_pins("[vehicle]\nnumber_of_magnets = 2\nwheel_diameter_cm = 6.35\n", "pins")]
fn invalid_config_exits_with_code_2(#[case] text: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, text);
    car()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_is_a_config_failure_in_json() {
    let dir = tempdir().unwrap();
    let out = car()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("could not be read"));
}

#[test]
fn ping_echoes_over_stdio() {
    let replies = session("?PING${\"time\": 12.5}${\"time\": 12.5}\n");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("~PING$"), "{}", replies[0]);
    assert_eq!(payload(&replies[0])["sent_time"], 12.5);
}

#[test]
fn start_status_stop_over_stdio() {
    let input = [
        r#"?STATIC_STATUS${}${"time": 1.0}"#,
        r#"?START${"distance": 100000.0, "reverse_brake": false}${"time": 1.0}"#,
        r#"?START${"distance": 5.0, "reverse_brake": false}${"time": 1.0}"#,
        r#"?STATUS${}${"time": 1.0}"#,
        r#"?STOP${}${"time": 1.0}"#,
        r#"?STOP${}${"time": 1.0}"#,
        "",
    ]
    .join("\n");
    let replies = session(&input);
    assert_eq!(replies.len(), 6, "{replies:?}");

    assert!(replies[0].starts_with("~STATIC_STATUS$"));
    assert_eq!(payload(&replies[0])["number_of_magnets"], 2);

    assert!(replies[1].starts_with("~START${}$"), "{}", replies[1]);

    assert!(replies[2].starts_with("~ERROR$"));
    assert_eq!(payload(&replies[2])["error_variant"], 21);

    assert!(replies[3].starts_with("~STATUS$"));
    let st = payload(&replies[3]);
    assert_eq!(st["running"], true);
    assert_eq!(st["stage"], 1);

    assert!(replies[4].starts_with("~STOP${}$"), "{}", replies[4]);

    assert!(replies[5].starts_with("~ERROR$"));
    assert_eq!(payload(&replies[5])["error_variant"], 25);
}

#[test]
fn garbage_gets_an_error_reply_and_serving_continues() {
    let input = "hello\n?PING${\"time\": 1.0}${\"time\": 1.0}\n";
    let replies = session(input);
    assert_eq!(replies.len(), 2, "{replies:?}");
    assert_eq!(payload(&replies[0])["error_variant"], 0);
    assert!(replies[1].starts_with("~PING$"));
}
