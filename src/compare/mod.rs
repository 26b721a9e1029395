//! Comparison engine
//!
//! Re-runs a stage for one registered test case and holds the output up
//! against the stored baseline. Equality is exact over the whole text; the
//! only normalization is CRLF to LF on freshly captured diagnostics of a
//! failure-path case. Stored baselines are never touched.

use std::fmt;

use similar::TextDiff;

use crate::case::{ArtifactKind, Expectation, TestCase};
use crate::error::HarnessError;
use crate::runner::{Outcome, Runner};
use crate::stage::{Adapters, Step};
use crate::store::BaselineStore;

/// Why a check did not pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// A success-path case whose compiler or interpreter failed
    StageFailed {
        step: Step,
        exit_code: Option<i32>,
        diagnostic: String,
    },
    /// Output differs from the baseline
    Mismatch { expected: String, actual: String },
    /// A failure-path case that succeeded, with output that differs from the
    /// error baseline
    UnexpectedSuccess { expected: String, actual: String },
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::StageFailed {
                step,
                exit_code,
                diagnostic,
            } => {
                match exit_code {
                    Some(code) => writeln!(f, "{} failed with exit status {}", step.as_str(), code)?,
                    None => writeln!(f, "{} was terminated by a signal", step.as_str())?,
                }
                write!(f, "{}", diagnostic)
            }
            CheckFailure::Mismatch { expected, actual } => {
                writeln!(f, "output does not match baseline")?;
                write!(f, "{}", render_diff(expected, actual))
            }
            CheckFailure::UnexpectedSuccess { expected, actual } => {
                writeln!(f, "expected the stage to fail, but it succeeded")?;
                write!(f, "{}", render_diff(expected, actual))
            }
        }
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(CheckFailure),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Replace every CRLF pair with a bare LF.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn compare(expected: String, actual: String) -> Verdict {
    if expected == actual {
        Verdict::Pass
    } else {
        Verdict::Fail(CheckFailure::Mismatch { expected, actual })
    }
}

/// Decide a verdict from a finished stage run.
///
/// `baseline` is only consulted when the outcome needs comparing, so a
/// success-path case that fails to compile reports the diagnostic even
/// when its baseline is missing.
pub fn evaluate<F>(
    expectation: Expectation,
    step: Step,
    outcome: Outcome,
    baseline: F,
) -> Result<Verdict, HarnessError>
where
    F: FnOnce() -> Result<String, HarnessError>,
{
    let verdict = match (expectation, outcome) {
        (Expectation::Success, Outcome::Failure { exit_code, text }) => {
            Verdict::Fail(CheckFailure::StageFailed {
                step,
                exit_code,
                diagnostic: text,
            })
        }
        (Expectation::Success, Outcome::Success { text }) => compare(baseline()?, text),
        (Expectation::Failure, Outcome::Success { text }) => {
            let expected = baseline()?;
            if expected == text {
                Verdict::Pass
            } else {
                Verdict::Fail(CheckFailure::UnexpectedSuccess {
                    expected,
                    actual: text,
                })
            }
        }
        (Expectation::Failure, Outcome::Failure { text, .. }) => {
            compare(baseline()?, normalize_line_endings(&text))
        }
    };
    Ok(verdict)
}

/// Runs checks against a baseline store
pub struct Comparator<'a, R: ?Sized, S: ?Sized> {
    adapters: Adapters<'a>,
    runner: &'a R,
    store: &'a S,
}

impl<'a, R, S> Comparator<'a, R, S>
where
    R: Runner + ?Sized,
    S: BaselineStore + ?Sized,
{
    pub fn new(adapters: Adapters<'a>, runner: &'a R, store: &'a S) -> Self {
        Self {
            adapters,
            runner,
            store,
        }
    }

    /// Check `case` against its `kind` baseline.
    ///
    /// `Err` means the case could not be evaluated at all (missing baseline,
    /// process could not be spawned or timed out).
    pub fn check(&self, case: &TestCase, kind: ArtifactKind) -> Result<Verdict, HarnessError> {
        let run = self.adapters.execute(self.runner, kind.stage(), case)?;
        let verdict = evaluate(kind.expectation(), run.step, run.outcome, || {
            Ok(self.store.read(&case.name, kind)?)
        })?;
        tracing::debug!(case = %case.name, %kind, pass = verdict.is_pass(), "checked");
        Ok(verdict)
    }
}

/// Unified line diff of expected against actual
pub fn render_diff(expected: &str, actual: &str) -> String {
    let mut out = TextDiff::from_lines(expected, actual)
        .unified_diff()
        .context_radius(3)
        .header("expected", "actual")
        .to_string();
    if normalize_line_endings(expected) == normalize_line_endings(actual) {
        out.push_str("note: texts differ only in line endings\n");
    }
    out
}
