use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn anomaly_dash() -> Command {
    let mut cmd = Command::cargo_bin("anomaly-dash").unwrap();
    for key in [
        "ANOMALY_API_URL",
        "ANOMALY_MAX_POINTS",
        "ANOMALY_MAX_ANOMALIES",
        "ANOMALY_CHART_WIDTH",
        "ANOMALY_CHART_HEIGHT",
        "ANOMALY_ALERT_TTL_MS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn points_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    anomaly_dash()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    anomaly_dash()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("anomaly-dash"));
}

#[test]
fn test_help_lists_subcommands() {
    anomaly_dash()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("health"));
}

// =============================================================================
// RENDER SUBCOMMAND
// =============================================================================

#[test]
fn test_render_to_stdout() {
    let input = points_file(&[
        r#"{"timestamp": "2024-05-01T12:00:00", "value": 1.0, "is_anomaly": false}"#,
        r#"{"timestamp": "2024-05-01T12:00:01", "value": 2.0, "is_anomaly": true}"#,
        r#"{"timestamp": "2024-05-01T12:00:02Z", "value": 3.0, "is_anomaly": false}"#,
    ]);

    let output = anomaly_dash()
        .arg("render")
        .arg("--input")
        .arg(input.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Rendered 3 of 3 points (0 skipped)"));

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.starts_with("<svg"));
    assert_eq!(stdout.matches("<circle").count(), 3);
    assert!(stdout.contains("#ef4444"));
    assert!(stdout.contains(r#"height="300""#));
}

#[test]
fn test_render_skips_malformed_lines() {
    let input = points_file(&[
        r#"{"timestamp": "2024-05-01T12:00:00", "value": 1.0}"#,
        "this is not json",
        r#"{"value": 2.0}"#,
        "",
        r#"{"timestamp": "2024-05-01T12:00:02", "value": 3.0, "is_anomaly": false}"#,
    ]);

    let output = anomaly_dash()
        .args(["render", "--input"])
        .arg(input.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("(2 skipped)"));

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.matches("<circle").count(), 2);
}

#[test]
fn test_render_keeps_only_the_window() {
    let lines: Vec<String> = (0..30)
        .map(|i| {
            format!(
                r#"{{"timestamp": "2024-05-01T12:00:{:02}", "value": {}, "is_anomaly": false}}"#,
                i,
                i
            )
        })
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let input = points_file(&refs);

    let output = anomaly_dash()
        .args(["render", "--max-points", "10", "--input"])
        .arg(input.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Rendered 10 of 30 points"));

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.matches("<circle").count(), 10);
    assert!(stdout.contains(r#"data-id="29""#));
    assert!(!stdout.contains(r#"data-id="19""#));
}

#[test]
fn test_render_to_file_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("chart.svg");

    anomaly_dash()
        .args(["render", "--quiet", "--width", "640", "--output"])
        .arg(&target)
        .write_stdin("{\"timestamp\": \"2024-05-01T12:00:00\", \"value\": 5.0}\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let svg = std::fs::read_to_string(&target).unwrap();
    assert!(svg.contains(r#"width="640""#));
    assert_eq!(svg.matches("<circle").count(), 1);
}

#[test]
fn test_render_empty_input_draws_no_markers() {
    let input = points_file(&[]);
    let output = anomaly_dash()
        .args(["render", "--input"])
        .arg(input.path())
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(stdout.starts_with("<svg"));
    assert!(!stdout.contains("<circle"));
    assert!(!stdout.contains("<path"));
}

#[test]
fn test_render_missing_input_file() {
    anomaly_dash()
        .args(["render", "--input", "/nonexistent/points.ndjson"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read input file"));
}

// =============================================================================
// WATCH SUBCOMMAND
// =============================================================================

#[test]
fn test_watch_rejects_out_of_range_settings() {
    anomaly_dash()
        .args(["watch", "--num-points", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--num-points"));

    anomaly_dash()
        .args(["watch", "--interval-ms", "15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("steps of 10"));

    anomaly_dash()
        .args(["watch", "--threshold", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0.01 and 1"));

    anomaly_dash()
        .args(["watch", "--window-size", "5000"])
        .assert()
        .failure();

    anomaly_dash()
        .args(["watch", "--model-type", "kmeans"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown model type"));
}

#[test]
fn test_watch_rejects_invalid_url() {
    anomaly_dash()
        .args(["watch", "--url", "ftp://example.org"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported scheme"));
}

#[test]
fn test_watch_unreachable_service() {
    anomaly_dash()
        .args([
            "watch",
            "--url",
            "http://127.0.0.1:1",
            "--connect-timeout-secs",
            "2",
        ])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error:"));
}

// =============================================================================
// HEALTH SUBCOMMAND
// =============================================================================

#[test]
fn test_health_invalid_url() {
    anomaly_dash()
        .args(["health", "--url", "not a url"])
        .assert()
        .code(2);
}

#[test]
fn test_health_unreachable_service() {
    anomaly_dash()
        .args(["health", "--url", "http://127.0.0.1:1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error:"));
}
