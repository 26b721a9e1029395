//! Error taxonomy for the harness
//!
//! A compiler that rejects its input is not an error here; that is an
//! [`Outcome`](crate::runner::Outcome). These types cover the cases where
//! the harness itself cannot do its job.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::case::{ArtifactKind, Stage};

/// Problems loading or validating the run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no {field} configured")]
    MissingField { field: &'static str },

    #[error("unknown suite '{name}', expected parse, semantic or emission")]
    UnknownSuite { name: String },

    #[error("suite for stage '{stage}' is defined more than once")]
    DuplicateSuite { stage: Stage },

    #[error("{role} not found at {}", path.display())]
    MissingExecutable { role: &'static str, path: PathBuf },

    #[error("directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf },
}

/// Problems spawning or awaiting an external process
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },

    #[error("failed while waiting for {}: {source}", program.display())]
    Wait { program: PathBuf, source: io::Error },

    #[error("{} did not finish within {}s", program.display(), timeout.as_secs_f64())]
    TimedOut { program: PathBuf, timeout: Duration },
}

/// Problems reading or writing baselines
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {kind} baseline for {case} (expected {})", path.display())]
    NotFound {
        case: String,
        kind: ArtifactKind,
        path: PathBuf,
    },

    #[error("{kind} baseline for {case} already exists at {}", path.display())]
    AlreadyExists {
        case: String,
        kind: ArtifactKind,
        path: PathBuf,
    },

    #[error("baseline i/o error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Any error that stops the harness from evaluating a test case
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not list test sources in {}: {source}", path.display())]
    Discovery { path: PathBuf, source: io::Error },

    #[error("suite '{suite}' names unknown test case '{case}'")]
    UnknownCase { suite: String, case: String },

    #[error("no registered check for test case '{case}'")]
    UnmatchedCase { case: String },

    #[error("nothing to check: no suite registrations and no baselines in {}", expected_dir.display())]
    NothingToCheck { expected_dir: PathBuf },
}

impl HarnessError {
    /// Environment errors abort the whole run before any test executes.
    pub fn is_environment(&self) -> bool {
        matches!(self, HarnessError::Config(_))
    }
}
