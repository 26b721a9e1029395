//! Runs the `gilt` binary against a scratch workspace

use std::process::{Command, Output};

use crate::common::*;

fn gilt(ws: &Workspace, args: &[&str]) -> Output {
    let config = ws.write_config_file();
    Command::new(env!("CARGO_BIN_EXE_gilt"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env_remove("GILT_LOG")
        .output()
        .expect("failed to run gilt")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn generate_then_check_passes() {
    let ws = Workspace::with_samples();
    ws.baseline("parse01e.err", "parse01e.usc:4: syntax error\n");

    let output = gilt(&ws, &["generate"]);
    assert!(output.status.success(), "{}", stdout(&output));
    let text = stdout(&output);
    assert!(text.contains("test001.ast: created"), "{}", text);
    assert!(text.contains("silent.output: pruned (empty output)"), "{}", text);
    assert!(text.contains("parse01e.ast: skipped (compiler exited with 1)"), "{}", text);

    let output = gilt(&ws, &["check"]);
    let text = stdout(&output);
    assert!(output.status.success(), "{}", text);
    assert!(text.contains("parse-error parse01e ... ok"), "{}", text);
    assert!(text.contains("execution-output quicksort ... ok"), "{}", text);
    assert!(text.contains("result: ok."), "{}", text);
}

#[test]
fn check_fails_on_regression() {
    let ws = Workspace::with_samples();
    assert!(gilt(&ws, &["generate", "--stage", "parse"]).status.success());
    ws.replace_compiler(REGRESSED_COMPILER);

    let output = gilt(&ws, &["check", "--stage", "parse", "test001"]);
    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{}", text);
    assert!(text.contains("parse-ast test001 ... FAILED"), "{}", text);
    assert!(text.contains("output does not match baseline"), "{}", text);
    assert!(text.contains("+  <regressed>"), "{}", text);
    assert!(!text.contains("quicksort"), "{}", text);
}

#[test]
fn check_reports_missing_baseline_as_error() {
    let ws = Workspace::with_samples();
    let config = ws.write_config_file();
    std::fs::write(
        &config,
        std::fs::read_to_string(&config).unwrap() + "\n[suite.parse]\nok = [\"test001\"]\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gilt"))
        .arg("--config")
        .arg(&config)
        .args(["check", "--stage", "parse"])
        .output()
        .expect("failed to run gilt");
    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{}", text);
    assert!(text.contains("parse-ast test001 ... ERROR"), "{}", text);
    assert!(text.contains("no parse-ast baseline for test001"), "{}", text);
}

#[test]
fn missing_compiler_exits_with_environment_error() {
    let ws = Workspace::with_samples();
    let output = Command::new(env!("CARGO_BIN_EXE_gilt"))
        .arg("--config")
        .arg(ws.write_config_file())
        .args(["--compiler", "/nonexistent/uscc", "check"])
        .output()
        .expect("failed to run gilt");

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compiler not found"), "{}", stderr);
}

#[test]
fn list_prints_cases() {
    let ws = Workspace::with_samples();
    ws.baseline("test001.output", "42\n");

    let output = gilt(&ws, &["list"]);
    let text = stdout(&output);
    assert!(output.status.success());
    assert!(text.contains("test001: execution-output"), "{}", text);
    assert!(text.contains("silent: (no baselines)"), "{}", text);
}

#[test]
fn check_rejects_unknown_case_name() {
    let ws = Workspace::with_samples();
    assert!(gilt(&ws, &["generate"]).status.success());

    let output = gilt(&ws, &["check", "tset001"]);
    assert_eq!(output.status.code(), Some(1), "{}", stdout(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no registered check for test case 'tset001'"), "{}", stderr);
}

#[test]
fn check_with_nothing_registered_fails() {
    let ws = Workspace::with_samples();

    let output = gilt(&ws, &["check"]);
    assert_eq!(output.status.code(), Some(1), "{}", stdout(&output));
    assert!(!stdout(&output).contains("result: ok"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nothing to check"), "{}", stderr);
}
