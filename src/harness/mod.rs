//! Run orchestration
//!
//! Ties configuration, discovery, the generator and the comparison engine
//! together for one run. Cases are handled strictly one after another.

use crate::case::{self, ArtifactKind, Stage, TestCase};
use crate::compare::{Comparator, Verdict};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::generate::{self, GenerationReport, Generator};
use crate::runner::{ProcessRunner, Runner};
use crate::stage::Adapters;
use crate::store::{BaselineStore, FsBaselineStore};
use crate::suite::{self, Registration};

/// Result of one registered check
#[derive(Debug)]
pub struct CheckResult {
    pub registration: Registration,
    /// `Err` when the case could not be evaluated
    pub verdict: Result<Verdict, HarnessError>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Ok(Verdict::Pass))
    }
}

/// All results of a check run
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub results: Vec<CheckResult>,
}

impl CheckSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.verdict, Ok(Verdict::Fail(_))))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().filter(|r| r.verdict.is_err()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(CheckResult::passed)
    }
}

/// One discovered case and the baselines it has
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub case: TestCase,
    pub kinds: Vec<ArtifactKind>,
}

/// A configured run over one tests directory
pub struct Harness<R = ProcessRunner, S = FsBaselineStore> {
    config: HarnessConfig,
    runner: R,
    store: S,
}

impl Harness {
    /// Validate the environment and set up a filesystem-backed run.
    ///
    /// Fails before any test runs if either executable is missing.
    pub fn from_config(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let runner = ProcessRunner::new(config.timeout);
        let store = FsBaselineStore::new(&config.expected_dir);
        Ok(Self::with_parts(config, runner, store))
    }
}

impl<R: Runner, S: BaselineStore> Harness<R, S> {
    /// Assemble a run from explicit parts, skipping environment validation
    pub fn with_parts(config: HarnessConfig, runner: R, store: S) -> Self {
        Self {
            config,
            runner,
            store,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn discover(&self) -> Result<Vec<TestCase>, HarnessError> {
        case::discover(&self.config.tests_dir, &self.config.source_extension)
    }

    /// Generate missing baselines for `stages` over every discovered case,
    /// then sweep any zero-length baseline out of the store.
    pub fn generate(&self, stages: &[Stage]) -> Result<GenerationReport, HarnessError> {
        let cases = self.discover()?;
        let kinds = generate::generated_kinds(stages);
        tracing::info!(cases = cases.len(), kinds = kinds.len(), "generating baselines");
        let mut report = Generator::new(Adapters::new(&self.config), &self.runner, &self.store)
            .generate(&cases, &kinds)?;
        report.swept = self.store.prune_empty()?;
        Ok(report)
    }

    /// Registered checks for `stages`, optionally limited to named cases.
    ///
    /// Every name in `only` must match a registration, and the result is
    /// never empty: a run that would check nothing is an error.
    pub fn registrations(
        &self,
        stages: &[Stage],
        only: &[String],
    ) -> Result<Vec<Registration>, HarnessError> {
        let cases = self.discover()?;
        let mut registrations = suite::registrations(
            stages,
            |stage| self.config.suite(stage).cloned(),
            &cases,
            &self.store,
        )?;
        if !only.is_empty() {
            if let Some(name) = only
                .iter()
                .find(|name| !registrations.iter().any(|r| r.case.name == **name))
            {
                return Err(HarnessError::UnmatchedCase { case: name.clone() });
            }
            registrations.retain(|r| only.iter().any(|name| *name == r.case.name));
        }
        if registrations.is_empty() {
            return Err(HarnessError::NothingToCheck {
                expected_dir: self.config.expected_dir.clone(),
            });
        }
        Ok(registrations)
    }

    /// Run every registration in order and collect the verdicts.
    pub fn check(&self, registrations: Vec<Registration>) -> CheckSummary {
        let comparator = Comparator::new(Adapters::new(&self.config), &self.runner, &self.store);
        let results = registrations
            .into_iter()
            .map(|registration| {
                let verdict = comparator.check(&registration.case, registration.kind);
                if let Err(e) = &verdict {
                    tracing::warn!(case = %registration.case, kind = %registration.kind, error = %e, "check could not run");
                }
                CheckResult {
                    registration,
                    verdict,
                }
            })
            .collect();
        CheckSummary { results }
    }

    /// Each discovered case with the kinds it has baselines for
    pub fn list(&self) -> Result<Vec<Listing>, HarnessError> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|case| {
                let kinds = ArtifactKind::ALL
                    .into_iter()
                    .filter(|kind| self.store.exists(&case.name, *kind))
                    .collect();
                Listing { case, kinds }
            })
            .collect())
    }
}
