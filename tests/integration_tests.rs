//! Integration tests: CLI smoke tests and end-to-end validation runs.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

fn json_line(stdout: &str) -> Value {
    let line = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON line in stdout: {stdout}"));
    serde_json::from_str(line).expect("parse JSON output")
}

fn write_transcript(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write transcript");
    path
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: shufv [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("shufv"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn subcommand_help_flags_work() {
    for sub in ["run", "analyze", "script", "config", "completions"] {
        let result = common::run_cli_case(&format!("help_{sub}"), &[sub, "--help"]);
        assert!(
            result.status.success(),
            "{sub} --help failed; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn completions_generate_for_bash() {
    let result = common::run_cli_case("completions_bash", &["completions", "bash"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("shufv"));
}

#[test]
fn script_prints_command_stream() {
    let result = common::run_cli_case(
        "script_prints_command_stream",
        &["script", "--trials", "3", "--elements", "a,b"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(
        result.stdout,
        "new\nit a\nit b\nshuffle\nshuffle\nshuffle\nfree\nquit\n"
    );
}

#[test]
fn script_rejects_zero_trials() {
    let result = common::run_cli_case("script_rejects_zero_trials", &["script", "--trials", "0"]);
    assert_eq!(
        result.status.code(),
        Some(1),
        "log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_validate_reports_defaults_as_valid() {
    let result = common::run_cli_case("config_validate_defaults", &["config", "validate"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["command"], "config validate");
    assert_eq!(payload["valid"], true);
    assert_eq!(payload["hash"].as_str().map(str::len), Some(16));
}

#[test]
fn explicit_missing_config_is_user_error() {
    let result = common::run_cli_case(
        "explicit_missing_config",
        &["--config", "/nonexistent/shufv/config.toml", "config", "show"],
    );
    assert_eq!(
        result.status.code(),
        Some(1),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("SUV-1002"), "log: {}", result.log_path.display());
}

#[test]
fn config_file_values_reach_show_output() {
    let home = tempfile::tempdir().unwrap();
    let config_path = home.path().join("custom.toml");
    fs::write(
        &config_path,
        "[trial]\ncount = 480\nelements = [\"x\", \"y\", \"z\"]\n\n[evaluation]\nexpectation = \"floor\"\n",
    )
    .unwrap();

    let result = common::run_cli_case_in(
        "config_file_values_reach_show_output",
        home.path(),
        &["--config", config_path.to_str().unwrap(), "config", "show"],
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["config"]["trial"]["count"], 480);
    assert_eq!(payload["config"]["trial"]["elements"][2], "z");
    assert_eq!(payload["config"]["evaluation"]["expectation"], "floor");
}

#[test]
fn env_override_beats_config_file() {
    let home = tempfile::tempdir().unwrap();
    let result = common::run_cli_case_in(
        "env_override_beats_config_file",
        home.path(),
        &["config", "show"],
        &[("SUV_TRIAL_COUNT", "2400")],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["config"]["trial"]["count"], 2400);
}

#[test]
fn analyze_uniform_transcript_passes() {
    let home = tempfile::tempdir().unwrap();
    let transcript = write_transcript(
        home.path(),
        "uniform.txt",
        &common::transcript_from(100, None),
    );
    let result = common::run_cli_case_in(
        "analyze_uniform_transcript_passes",
        home.path(),
        &[
            "analyze",
            transcript.to_str().unwrap(),
            "--trials",
            "2400",
            "--max-statistic",
            "35.17",
        ],
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let report = &json_line(&result.stdout)["report"];
    assert_eq!(report["observations"], 2400);
    assert_eq!(report["complete"], true);
    assert_eq!(report["evaluation"]["degrees_of_freedom"], 23);
    assert_eq!(report["evaluation"]["statistic"].as_f64(), Some(0.0));
    assert_eq!(report["verdict"], "pass");
    assert_eq!(report["classes"].as_array().map(Vec::len), Some(24));
}

#[test]
fn analyze_skewed_transcript_fails_verdict() {
    let home = tempfile::tempdir().unwrap();
    let transcript = write_transcript(
        home.path(),
        "skewed.txt",
        &common::transcript_from(10, Some([4, 3, 2, 1])),
    );
    let result = common::run_cli_case_in(
        "analyze_skewed_transcript_fails_verdict",
        home.path(),
        &[
            "analyze",
            transcript.to_str().unwrap(),
            "--trials",
            "240",
            "--max-statistic",
            "35.17",
        ],
        &[],
    );
    assert_eq!(
        result.status.code(),
        Some(4),
        "log: {}",
        result.log_path.display()
    );
    let report = &json_line(&result.stdout)["report"];
    assert_eq!(report["verdict"], "fail");
    // Every observation in one class: (240 - 10)^2 / 10 + 23 * 10.
    let statistic = report["evaluation"]["statistic"].as_f64().unwrap();
    assert!((statistic - 5520.0).abs() < 1e-6, "statistic {statistic}");
}

#[test]
fn analyze_without_teardown_is_session_error() {
    let home = tempfile::tempdir().unwrap();
    let mut text = common::transcript_from(1, None);
    text = text.replace("l = NULL\n", "");
    let transcript = write_transcript(home.path(), "truncated.txt", &text);
    let result = common::run_cli_case_in(
        "analyze_without_teardown_is_session_error",
        home.path(),
        &["analyze", transcript.to_str().unwrap(), "--trials", "24"],
        &[],
    );
    assert_eq!(
        result.status.code(),
        Some(2),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("SUV-3002"), "log: {}", result.log_path.display());
}

#[test]
fn run_with_missing_program_is_launch_error() {
    let result = common::run_cli_case(
        "run_with_missing_program_is_launch_error",
        &["run", "--program", "/nonexistent/qtest", "--trials", "24"],
    );
    assert_eq!(
        result.status.code(),
        Some(2),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("SUV-2001"), "log: {}", result.log_path.display());
}

#[cfg(unix)]
fn fake_program(dir: &Path, transcript: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-qtest");
    let body = format!(
        "#!/bin/sh\ncat > /dev/null\ncat '{}'\nexit 0\n",
        transcript.display()
    );
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn run_end_to_end_against_fake_program() {
    let home = tempfile::tempdir().unwrap();
    let transcript = write_transcript(
        home.path(),
        "canned.txt",
        &common::transcript_from(50, None),
    );
    let program = fake_program(home.path(), &transcript);
    let saved = home.path().join("saved.txt");

    let result = common::run_cli_case_in(
        "run_end_to_end_against_fake_program",
        home.path(),
        &[
            "run",
            "--program",
            program.to_str().unwrap(),
            "--trials",
            "1200",
            "--timeout-secs",
            "30",
            "--save-transcript",
            saved.to_str().unwrap(),
            "--max-statistic",
            "35.17",
        ],
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let report = &json_line(&result.stdout)["report"];
    assert_eq!(report["observations"], 1200);
    assert_eq!(report["shortfall"], 0);
    assert_eq!(report["verdict"], "pass");
    assert_eq!(report["session"]["exit_code"], 0);
    assert_eq!(
        fs::read_to_string(&saved).unwrap(),
        fs::read_to_string(&transcript).unwrap()
    );

    let log = home
        .path()
        .join(".local")
        .join("share")
        .join("shufv")
        .join("runs.jsonl");
    let events: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|l| {
            let v: Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(events.first().map(String::as_str), Some("run_start"));
    assert_eq!(events.last().map(String::as_str), Some("evaluation"));
}

#[cfg(unix)]
#[test]
fn run_reports_shortfall_without_failing() {
    let home = tempfile::tempdir().unwrap();
    let transcript = write_transcript(
        home.path(),
        "short.txt",
        &common::transcript_from(10, None),
    );
    let program = fake_program(home.path(), &transcript);

    let result = common::run_cli_case_in(
        "run_reports_shortfall_without_failing",
        home.path(),
        &[
            "run",
            "--program",
            program.to_str().unwrap(),
            "--trials",
            "300",
            "--no-log",
        ],
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let report = &json_line(&result.stdout)["report"];
    assert_eq!(report["observations"], 240);
    assert_eq!(report["shortfall"], 60);
    assert_eq!(report["complete"], false);
    assert!(report.get("verdict").is_none());
    assert!(
        !home.path().join(".local").exists(),
        "--no-log still wrote a run log"
    );
}
