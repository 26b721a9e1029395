//! Comparison engine tests against the fake toolchain

use std::time::Duration;

use gilt::compare::{CheckFailure, Comparator};
use gilt::error::{RunError, StoreError};
use gilt::stage::{Adapters, Step};
use gilt::{ArtifactKind, HarnessError, ProcessRunner, Stage, TestCase, Verdict};

use crate::common::*;

fn case(name: &str) -> TestCase {
    TestCase::new(name, format!("{}.usc", name))
}

fn check(ws: &Workspace, name: &str, kind: ArtifactKind) -> Result<Verdict, HarnessError> {
    let harness = ws.harness();
    let runner = ProcessRunner::new(ws.config.timeout);
    Comparator::new(Adapters::new(&ws.config), &runner, harness.store()).check(&case(name), kind)
}

#[test]
fn parse_ast_matches_baseline() {
    let ws = Workspace::with_samples();
    ws.baseline("test001.ast", "Program test001\n  var x\n  print 42\n");

    assert_eq!(check(&ws, "test001", ArtifactKind::ParseAst).unwrap(), Verdict::Pass);
}

#[test]
fn parse_error_matches_after_crlf_normalization() {
    let ws = Workspace::with_samples();
    // The compiler prints "parse01e.usc:4: syntax error\r\n"
    ws.baseline("parse01e.err", "parse01e.usc:4: syntax error\n");

    assert_eq!(check(&ws, "parse01e", ArtifactKind::ParseError).unwrap(), Verdict::Pass);
}

#[test]
fn parse_error_baseline_is_not_normalized() {
    let ws = Workspace::with_samples();
    ws.baseline("parse01e.err", "parse01e.usc:4: syntax error\r\n");

    let verdict = check(&ws, "parse01e", ArtifactKind::ParseError).unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(CheckFailure::Mismatch {
            expected: "parse01e.usc:4: syntax error\r\n".to_string(),
            actual: "parse01e.usc:4: syntax error\n".to_string(),
        })
    );
}

#[test]
fn semantic_error_captures_both_streams() {
    let ws = Workspace::with_samples();
    ws.baseline(
        "semant01e.semant.err",
        "semant01e.usc: error: use of undeclared identifier\n1 error(s)\n",
    );

    assert_eq!(
        check(&ws, "semant01e", ArtifactKind::SemanticError).unwrap(),
        Verdict::Pass
    );
}

#[test]
fn execution_output_matches_baseline() {
    let ws = Workspace::with_samples();
    ws.baseline("quicksort.output", "1 2 3 4 5\n");

    assert_eq!(
        check(&ws, "quicksort", ArtifactKind::ExecutionOutput).unwrap(),
        Verdict::Pass
    );
}

#[test]
fn success_path_reports_compiler_diagnostic() {
    let ws = Workspace::with_samples();
    ws.baseline("quicksort.output", "1 2 3 4 5\n");
    ws.replace_compiler(REGRESSED_COMPILER);

    let verdict = check(&ws, "quicksort", ArtifactKind::ExecutionOutput).unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(CheckFailure::StageFailed {
            step: Step::Compile,
            exit_code: Some(70),
            diagnostic: "quicksort.usc:1: internal compiler error\n".to_string(),
        })
    );
    // The interpreter never ran, so no artifact was left behind
    assert!(!ws.tests_dir().join("quicksort.bc").exists());
}

#[test]
fn success_path_reports_interpreter_failure() {
    let ws = Workspace::new();
    ws.source("crash", CRASH);
    ws.baseline("crash.output", "partial\n");

    let verdict = check(&ws, "crash", ArtifactKind::ExecutionOutput).unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(CheckFailure::StageFailed {
            step: Step::Interpret,
            exit_code: Some(3),
            diagnostic: "partial\nstack overflow\n".to_string(),
        })
    );
}

#[test]
fn success_path_fails_without_artifact() {
    let ws = Workspace::new();
    ws.source("noart", NO_ARTIFACT);
    ws.baseline("noart.output", "anything\n");

    let verdict = check(&ws, "noart", ArtifactKind::ExecutionOutput).unwrap();
    let Verdict::Fail(CheckFailure::StageFailed {
        step, diagnostic, ..
    }) = verdict
    else {
        panic!("expected a stage failure, got {:?}", verdict);
    };
    assert_eq!(step, Step::Compile);
    assert!(diagnostic.contains("wrote no"), "{}", diagnostic);
}

#[test]
fn ast_regression_is_a_mismatch() {
    let ws = Workspace::with_samples();
    ws.baseline("test001.ast", "Program test001\n  var x\n  print 42\n");
    ws.replace_compiler(REGRESSED_COMPILER);

    let verdict = check(&ws, "test001", ArtifactKind::ParseAst).unwrap();
    let Verdict::Fail(failure) = verdict else {
        panic!("regression went unnoticed");
    };
    assert!(matches!(failure, CheckFailure::Mismatch { .. }));
    let message = failure.to_string();
    assert!(message.contains("-  var x"), "{}", message);
    assert!(message.contains("+  <regressed>"), "{}", message);
}

#[test]
fn error_case_that_succeeds_is_labeled() {
    let ws = Workspace::with_samples();
    ws.baseline("parse01e.err", "parse01e.usc:4: syntax error\n");
    ws.replace_compiler(REGRESSED_COMPILER);

    let verdict = check(&ws, "parse01e", ArtifactKind::ParseError).unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(CheckFailure::UnexpectedSuccess {
            expected: "parse01e.usc:4: syntax error\n".to_string(),
            actual: "Program parse01e\n  <regressed>\n".to_string(),
        })
    );
}

#[test]
fn missing_baseline_is_a_setup_error() {
    let ws = Workspace::with_samples();

    let err = check(&ws, "test001", ArtifactKind::SemanticAst).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Store(StoreError::NotFound {
            kind: ArtifactKind::SemanticAst,
            ..
        })
    ));
}

#[test]
fn missing_baseline_does_not_generate() {
    let ws = Workspace::with_samples();
    let _ = check(&ws, "test001", ArtifactKind::ParseAst);
    assert!(ws.read_baseline("test001.ast").is_none());
}

#[test]
fn hung_compiler_times_out() {
    let mut ws = Workspace::new();
    ws.source("hang", HANG);
    ws.baseline("hang.ast", "Program hang\n");
    ws.config.timeout = Some(Duration::from_millis(300));

    let err = check(&ws, "hang", ArtifactKind::ParseAst).unwrap_err();
    assert!(matches!(err, HarnessError::Run(RunError::TimedOut { .. })));
}

#[test]
fn generated_baselines_round_trip() {
    let ws = Workspace::with_samples();
    let harness = ws.harness();
    harness.generate(&Stage::ALL).unwrap();

    let registrations = harness.registrations(&Stage::ALL, &[]).unwrap();
    assert!(!registrations.is_empty());

    let summary = harness.check(registrations);
    for result in &summary.results {
        assert!(
            result.passed(),
            "{} {} did not round trip: {:?}",
            result.registration.kind,
            result.registration.case,
            result.verdict
        );
    }
}

#[test]
fn harness_summary_counts() {
    let ws = Workspace::with_samples();
    ws.baseline("test001.ast", "Program test001\n  var x\n  print 42\n");
    ws.baseline("quicksort.ast", "wrong\n");
    ws.baseline("parse01e.err", "parse01e.usc:4: syntax error\n");

    let harness = ws.harness();
    let registrations = harness.registrations(&[Stage::Parse], &[]).unwrap();
    let summary = harness.check(registrations);

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.passed(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.errors(), 0);
    assert!(!summary.all_passed());
}

#[test]
fn harness_filters_by_case_name() {
    let ws = Workspace::with_samples();
    let harness = ws.harness();
    harness.generate(&Stage::ALL).unwrap();

    let registrations = harness
        .registrations(&Stage::ALL, &["quicksort".to_string()])
        .unwrap();
    assert_eq!(registrations.len(), 3);
    assert!(registrations.iter().all(|r| r.case.name == "quicksort"));
}

#[test]
fn explicit_suite_reports_missing_baseline() {
    let mut ws = Workspace::with_samples();
    ws.config.set_suite(
        Stage::Parse,
        gilt::config::SuiteTable {
            ok: vec!["test001".to_string()],
            err: vec!["parse01e".to_string()],
        },
    );
    ws.baseline("test001.ast", "Program test001\n  var x\n  print 42\n");

    let harness = ws.harness();
    let registrations = harness.registrations(&[Stage::Parse], &[]).unwrap();
    let summary = harness.check(registrations);

    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.errors(), 1);
    let error = summary.results.iter().find(|r| r.verdict.is_err()).unwrap();
    assert_eq!(error.registration.case.name, "parse01e");
    assert_eq!(error.registration.kind, ArtifactKind::ParseError);
}

#[test]
fn harness_rejects_unmatched_case_name() {
    let ws = Workspace::with_samples();
    let harness = ws.harness();
    harness.generate(&Stage::ALL).unwrap();

    let err = harness
        .registrations(&Stage::ALL, &["test001".to_string(), "tset001".to_string()])
        .unwrap_err();
    assert!(matches!(err, HarnessError::UnmatchedCase { ref case } if case == "tset001"));
}

#[test]
fn harness_refuses_an_empty_run() {
    let ws = Workspace::with_samples();

    let err = ws.harness().registrations(&Stage::ALL, &[]).unwrap_err();
    assert!(matches!(err, HarnessError::NothingToCheck { .. }));
    assert!(err.to_string().contains("nothing to check"));
}
