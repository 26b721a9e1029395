//! Baseline generator
//!
//! Fills in missing success-path baselines by running each stage and
//! persisting what it printed. Existing baselines are ground truth and are
//! left alone; regenerating one means deleting it by hand first.

use std::fmt;
use std::path::PathBuf;

use crate::case::{ArtifactKind, Stage, TestCase};
use crate::error::{HarnessError, StoreError};
use crate::runner::{Outcome, Runner};
use crate::stage::{Adapters, Step};
use crate::store::BaselineStore;

/// What happened to one (case, kind) during generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// A baseline was already present; nothing ran
    Existing,
    /// A new baseline was written
    Created,
    /// The stage printed nothing, so no baseline was kept
    Pruned,
    /// The stage failed; no baseline was written
    Skipped { step: Step, exit_code: Option<i32> },
    /// The stage could not be run at all (spawn failure, timeout)
    Errored { message: String },
}

impl fmt::Display for Generated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generated::Existing => f.write_str("exists"),
            Generated::Created => f.write_str("created"),
            Generated::Pruned => f.write_str("pruned (empty output)"),
            Generated::Skipped { step, exit_code } => match exit_code {
                Some(code) => write!(f, "skipped ({} exited with {})", step.as_str(), code),
                None => write!(f, "skipped ({} killed by signal)", step.as_str()),
            },
            Generated::Errored { message } => write!(f, "error: {}", message),
        }
    }
}

/// One line of a generation report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationEntry {
    pub case: String,
    pub kind: ArtifactKind,
    pub status: Generated,
}

/// Everything one generation pass did, in visiting order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub entries: Vec<GenerationEntry>,
    /// Zero-length baseline files removed after the pass
    pub swept: Vec<PathBuf>,
}

impl GenerationReport {
    pub fn count(&self, pred: impl Fn(&Generated) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|s| *s == Generated::Created)
    }

    pub fn errored(&self) -> usize {
        self.count(|s| matches!(s, Generated::Errored { .. }))
    }

    /// True when the pass changed nothing on disk
    pub fn is_noop(&self) -> bool {
        self.created() == 0 && self.swept.is_empty()
    }
}

/// Kinds the generator produces for `stages`
pub fn generated_kinds(stages: &[Stage]) -> Vec<ArtifactKind> {
    let mut kinds: Vec<_> = stages
        .iter()
        .map(|stage| stage.success_kind())
        .filter(|kind| kind.is_generated())
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Populates a baseline store from stage output
pub struct Generator<'a, R: ?Sized, S: ?Sized> {
    adapters: Adapters<'a>,
    runner: &'a R,
    store: &'a S,
}

impl<'a, R, S> Generator<'a, R, S>
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

    /// Generate every missing baseline of `kinds` for `cases`.
    ///
    /// A case whose stage cannot be run is recorded and the pass moves on;
    /// only baseline store failures abort it.
    pub fn generate(
        &self,
        cases: &[TestCase],
        kinds: &[ArtifactKind],
    ) -> Result<GenerationReport, HarnessError> {
        let mut report = GenerationReport::default();
        for kind in kinds {
            for case in cases {
                let status = self.generate_one(case, *kind)?;
                report.entries.push(GenerationEntry {
                    case: case.name.clone(),
                    kind: *kind,
                    status,
                });
            }
        }
        Ok(report)
    }

    /// Generate a single baseline if it is missing.
    pub fn generate_one(&self, case: &TestCase, kind: ArtifactKind) -> Result<Generated, HarnessError> {
        if self.store.exists(&case.name, kind) {
            return Ok(Generated::Existing);
        }

        let run = match self.adapters.execute(self.runner, kind.stage(), case) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(case = %case.name, %kind, error = %e, "stage could not run, no baseline");
                return Ok(Generated::Errored {
                    message: e.to_string(),
                });
            }
        };
        let text = match run.outcome {
            Outcome::Success { text } => text,
            Outcome::Failure { exit_code, .. } => {
                tracing::info!(case = %case.name, %kind, step = run.step.as_str(), ?exit_code, "stage failed, no baseline");
                return Ok(Generated::Skipped {
                    step: run.step,
                    exit_code,
                });
            }
        };

        // An empty baseline would pass against any empty output, so none is kept.
        if text.is_empty() {
            tracing::info!(case = %case.name, %kind, "empty output, baseline pruned");
            return Ok(Generated::Pruned);
        }

        match self.store.write(&case.name, kind, &text) {
            Ok(()) => {
                tracing::info!(case = %case.name, %kind, "baseline created");
                Ok(Generated::Created)
            }
            // Someone else created it between the check and the write
            Err(StoreError::AlreadyExists { .. }) => Ok(Generated::Existing),
            Err(e) => Err(e.into()),
        }
    }
}
