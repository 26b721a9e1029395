//! Test cases and artifact kinds
//!
//! A test case is one source file in the tests directory, named after its
//! stem. An artifact kind says which pipeline stage a baseline belongs to
//! and whether the stage is expected to succeed or fail.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::HarnessError;

/// One named unit under test, backed by one source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestCase {
    /// Stable name, e.g. `test001`
    pub name: String,
    /// Source file name relative to the tests directory, e.g. `test001.usc`
    pub source: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Build a test case from a source file named exactly
    /// `<name>.<extension>`.
    ///
    /// The name may not contain a `.`, so `foo.bak.usc` is not a test case
    /// and can never shadow `foo.usc`.
    pub fn from_file_name(file_name: &str, extension: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
        if stem.is_empty() || stem.contains('.') {
            return None;
        }
        Some(Self::new(stem, file_name))
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Enumerate the test cases in `dir` whose files end in `.{extension}`.
///
/// Results are sorted by name so every run visits cases in the same order.
pub fn discover(dir: &Path, extension: &str) -> Result<Vec<TestCase>, HarnessError> {
    let entries = fs::read_dir(dir).map_err(|source| HarnessError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut cases = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| HarnessError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match TestCase::from_file_name(file_name, extension) {
            Some(case) => cases.push(case),
            None => tracing::debug!(file = file_name, "not a test case name, skipping"),
        }
    }

    cases.sort();
    Ok(cases)
}

/// Pipeline stage driven by one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Lexical and syntactic analysis, AST dump
    Parse,
    /// Full semantic analysis, AST dump
    Semantic,
    /// Code emission followed by interpretation of the emitted IR
    Emission,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Parse, Stage::Semantic, Stage::Emission];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Semantic => "semantic",
            Stage::Emission => "emission",
        }
    }

    /// Artifact kind checked when the stage is expected to succeed
    pub fn success_kind(self) -> ArtifactKind {
        match self {
            Stage::Parse => ArtifactKind::ParseAst,
            Stage::Semantic => ArtifactKind::SemanticAst,
            Stage::Emission => ArtifactKind::ExecutionOutput,
        }
    }

    /// Artifact kind checked when the stage is expected to fail
    pub fn failure_kind(self) -> Option<ArtifactKind> {
        match self {
            Stage::Parse => Some(ArtifactKind::ParseError),
            Stage::Semantic => Some(ArtifactKind::SemanticError),
            Stage::Emission => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse" => Ok(Stage::Parse),
            "semantic" | "semant" => Ok(Stage::Semantic),
            "emission" | "emit" => Ok(Stage::Emission),
            other => Err(format!(
                "unknown stage '{}', expected parse, semantic or emission",
                other
            )),
        }
    }
}

/// Whether a check expects the stage to succeed or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Success,
    Failure,
}

/// Which stage and which facet of its output a baseline represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    ParseAst,
    ParseError,
    SemanticAst,
    SemanticError,
    ExecutionOutput,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::ParseAst,
        ArtifactKind::ParseError,
        ArtifactKind::SemanticAst,
        ArtifactKind::SemanticError,
        ArtifactKind::ExecutionOutput,
    ];

    /// File extension of the baseline, without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::ParseAst => "ast",
            ArtifactKind::ParseError => "err",
            ArtifactKind::SemanticAst => "semant.ast",
            ArtifactKind::SemanticError => "semant.err",
            ArtifactKind::ExecutionOutput => "output",
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            ArtifactKind::ParseAst | ArtifactKind::ParseError => Stage::Parse,
            ArtifactKind::SemanticAst | ArtifactKind::SemanticError => Stage::Semantic,
            ArtifactKind::ExecutionOutput => Stage::Emission,
        }
    }

    pub fn expectation(self) -> Expectation {
        match self {
            ArtifactKind::ParseError | ArtifactKind::SemanticError => Expectation::Failure,
            _ => Expectation::Success,
        }
    }

    /// Kinds the generator may create. Error baselines are written by hand.
    pub fn is_generated(self) -> bool {
        self.expectation() == Expectation::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::ParseAst => "parse-ast",
            ArtifactKind::ParseError => "parse-error",
            ArtifactKind::SemanticAst => "semantic-ast",
            ArtifactKind::SemanticError => "semantic-error",
            ArtifactKind::ExecutionOutput => "execution-output",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown artifact kind '{}'", s))
    }
}
