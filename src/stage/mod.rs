//! Stage adapters
//!
//! Each pipeline stage has a fixed recipe for turning a test case into one
//! or two process invocations:
//!
//! - parse: `compiler <parse flags> <source>`, merged output
//! - semantic: `compiler <semantic flags> <source>`, merged output
//! - emission: `compiler <emission flags> <source>`, then
//!   `interpreter <case>.<artifact>` with stdout as the payload
//!
//! Everything runs inside the tests directory with relative file names, so
//! diagnostics mention `foo.usc` exactly as the baselines do.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::case::{Stage, TestCase};
use crate::config::HarnessConfig;
use crate::error::RunError;
use crate::runner::{CaptureMode, Invocation, Outcome, Runner};

/// Which process produced a stage's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Compile,
    Interpret,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Compile => "compiler",
            Step::Interpret => "interpreter",
        }
    }
}

/// Invocation plan for one test case at one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// A single compiler run whose output is the payload
    Single(Invocation),
    /// Compile to an intermediate artifact, then interpret it
    CompileThenRun {
        compile: Invocation,
        artifact: PathBuf,
        run: Invocation,
    },
}

/// Outcome of running a stage, tagged with the step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    pub step: Step,
    pub outcome: Outcome,
}

/// Builds and executes stage plans from the run configuration
#[derive(Debug, Clone, Copy)]
pub struct Adapters<'a> {
    config: &'a HarnessConfig,
}

impl<'a> Adapters<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Map a test case to its invocations. Pure; nothing is spawned.
    pub fn plan(&self, stage: Stage, case: &TestCase) -> Plan {
        let compile = Invocation::new(&self.config.compiler, CaptureMode::Merged)
            .args(self.config.flags.for_stage(stage).iter().cloned())
            .arg(&case.source)
            .current_dir(&self.config.tests_dir);

        match stage {
            Stage::Parse | Stage::Semantic => Plan::Single(compile),
            Stage::Emission => {
                let artifact_name = format!("{}.{}", case.name, self.config.artifact_extension);
                let run = Invocation::new(&self.config.interpreter, CaptureMode::StdoutOnly)
                    .arg(&artifact_name)
                    .current_dir(&self.config.tests_dir);
                Plan::CompileThenRun {
                    compile,
                    artifact: self.config.tests_dir.join(artifact_name),
                    run,
                }
            }
        }
    }

    /// Run a stage for one test case.
    ///
    /// For emission the interpreter only runs when the compiler succeeded
    /// and left an artifact behind; otherwise the compiler's outcome is the
    /// result.
    pub fn execute<R: Runner + ?Sized>(
        &self,
        runner: &R,
        stage: Stage,
        case: &TestCase,
    ) -> Result<StageRun, RunError> {
        match self.plan(stage, case) {
            Plan::Single(invocation) => Ok(StageRun {
                step: Step::Compile,
                outcome: runner.run(&invocation)?,
            }),
            Plan::CompileThenRun {
                compile,
                artifact,
                run,
            } => {
                // A stale artifact from an earlier run must not stand in for
                // one this compile failed to produce.
                match fs::remove_file(&artifact) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::debug!(path = %artifact.display(), error = %e, "could not remove stale artifact");
                    }
                }

                let compiled = runner.run(&compile)?;
                if !compiled.is_success() {
                    return Ok(StageRun {
                        step: Step::Compile,
                        outcome: compiled,
                    });
                }
                if !artifact.is_file() {
                    let mut text = compiled.into_text();
                    text.push_str(&format!(
                        "compiler exited successfully but wrote no {}\n",
                        artifact.display()
                    ));
                    return Ok(StageRun {
                        step: Step::Compile,
                        outcome: Outcome::failure(Some(0), text),
                    });
                }

                Ok(StageRun {
                    step: Step::Interpret,
                    outcome: runner.run(&run)?,
                })
            }
        }
    }
}
