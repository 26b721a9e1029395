//! Suite registry
//!
//! Decides which (case, kind) pairs a check run covers. A stage either
//! lists its cases explicitly in the config, or has them inferred from the
//! baselines that already exist.

use rustc_hash::FxHashMap as HashMap;

use crate::case::{ArtifactKind, Stage, TestCase};
use crate::config::SuiteTable;
use crate::error::HarnessError;
use crate::store::BaselineStore;

/// One check to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub case: TestCase,
    pub kind: ArtifactKind,
}

impl Registration {
    pub fn new(case: TestCase, kind: ArtifactKind) -> Self {
        Self { case, kind }
    }
}

/// Registrations for one stage from its explicit suite table.
///
/// Every listed name must be a discovered case. The emission stage has no
/// failure kind, so its `err` list is ignored.
pub fn explicit(
    stage: Stage,
    table: &SuiteTable,
    cases: &[TestCase],
) -> Result<Vec<Registration>, HarnessError> {
    let by_name: HashMap<&str, &TestCase> = cases.iter().map(|c| (c.name.as_str(), c)).collect();
    let lookup = |name: &String| {
        by_name
            .get(name.as_str())
            .map(|case| (*case).clone())
            .ok_or_else(|| HarnessError::UnknownCase {
                suite: stage.as_str().to_string(),
                case: name.clone(),
            })
    };

    let mut registrations = Vec::new();
    for name in &table.ok {
        registrations.push(Registration::new(lookup(name)?, stage.success_kind()));
    }
    match stage.failure_kind() {
        Some(kind) => {
            for name in &table.err {
                registrations.push(Registration::new(lookup(name)?, kind));
            }
        }
        None if !table.err.is_empty() => {
            tracing::warn!(suite = stage.as_str(), "ignoring err list, stage has no failure baselines");
        }
        None => {}
    }

    registrations.sort_by(|a, b| a.case.cmp(&b.case).then(a.kind.cmp(&b.kind)));
    Ok(registrations)
}

/// Registrations for one stage inferred from existing baselines
pub fn inferred<S: BaselineStore + ?Sized>(
    stage: Stage,
    cases: &[TestCase],
    store: &S,
) -> Vec<Registration> {
    let kinds = std::iter::once(stage.success_kind()).chain(stage.failure_kind());

    let mut registrations = Vec::new();
    for case in cases {
        for kind in kinds.clone() {
            if store.exists(&case.name, kind) {
                registrations.push(Registration::new(case.clone(), kind));
            }
        }
    }
    registrations
}

/// Everything to check for the given stages, in stage order then case order
pub fn registrations<S: BaselineStore + ?Sized>(
    stages: &[Stage],
    suites: impl Fn(Stage) -> Option<SuiteTable>,
    cases: &[TestCase],
    store: &S,
) -> Result<Vec<Registration>, HarnessError> {
    let mut stages = stages.to_vec();
    stages.sort();
    stages.dedup();

    let mut all = Vec::new();
    for stage in stages {
        match suites(stage) {
            Some(table) => all.extend(explicit(stage, &table, cases)?),
            None => all.extend(inferred(stage, cases, store)),
        }
    }
    Ok(all)
}
