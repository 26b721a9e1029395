//! Run configuration
//!
//! Paths to the two external executables plus the directory layout and the
//! flag recipe for each stage. Loaded from `gilt.toml`, resolved against the
//! directory holding that file, and validated once before any test runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;

use crate::case::Stage;
use crate::error::ConfigError;

/// Default config file name, looked up in the current directory
pub const CONFIG_FILE: &str = "gilt.toml";

/// Compiler flags for each stage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageFlags {
    pub parse: Vec<String>,
    pub semantic: Vec<String>,
    pub emission: Vec<String>,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            parse: vec!["-a".to_string()],
            semantic: vec!["-a".to_string()],
            emission: vec!["-O".to_string()],
        }
    }
}

impl StageFlags {
    pub fn for_stage(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::Parse => &self.parse,
            Stage::Semantic => &self.semantic,
            Stage::Emission => &self.emission,
        }
    }
}

/// Explicit registrations for one suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteTable {
    /// Cases expected to pass the stage
    pub ok: Vec<String>,
    /// Cases expected to be rejected by the stage
    pub err: Vec<String>,
}

/// On-disk shape of `gilt.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    compiler: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    tests_dir: Option<PathBuf>,
    expected_dir: Option<PathBuf>,
    source_extension: Option<String>,
    artifact_extension: Option<String>,
    timeout_secs: Option<u64>,
    flags: StageFlags,
    suite: HashMap<String, SuiteTable>,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub compiler: PathBuf,
    pub interpreter: PathBuf,
    /// Directory holding the test sources; child processes run here
    pub tests_dir: PathBuf,
    /// Directory holding the baselines
    pub expected_dir: PathBuf,
    pub source_extension: String,
    /// Extension of the file the compiler emits next to the source
    pub artifact_extension: String,
    /// `None` waits forever
    pub timeout: Option<Duration>,
    pub flags: StageFlags,
    suites: HashMap<Stage, SuiteTable>,
}

/// Values supplied on the command line, overriding the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub compiler: Option<PathBuf>,
    pub interpreter: Option<PathBuf>,
}

impl HarnessConfig {
    /// Configuration with default layout rooted at `tests_dir`
    pub fn new(
        compiler: impl Into<PathBuf>,
        interpreter: impl Into<PathBuf>,
        tests_dir: impl Into<PathBuf>,
    ) -> Self {
        let tests_dir = tests_dir.into();
        Self {
            compiler: compiler.into(),
            interpreter: interpreter.into(),
            expected_dir: tests_dir.join("expected"),
            tests_dir,
            source_extension: "usc".to_string(),
            artifact_extension: "bc".to_string(),
            timeout: Some(Duration::from_secs(60)),
            flags: StageFlags::default(),
            suites: HashMap::default(),
        }
    }

    /// Parse the text of the config file at `path`. Relative paths inside
    /// it are resolved against the directory holding `path`.
    pub fn from_toml(text: &str, path: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::resolve(raw, &base_dir(path), overrides)
    }

    /// Load `path` if it exists; otherwise build from defaults and overrides.
    pub fn load_or_default(path: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::resolve(RawConfig::default(), &base_dir(path), overrides);
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path, overrides)
    }

    fn resolve(raw: RawConfig, base_dir: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let compiler = match (&overrides.compiler, raw.compiler) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => base_dir.join(path),
            (None, None) => return Err(ConfigError::MissingField { field: "compiler" }),
        };
        let interpreter = match (&overrides.interpreter, raw.interpreter) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => base_dir.join(path),
            (None, None) => {
                return Err(ConfigError::MissingField {
                    field: "interpreter",
                });
            }
        };

        let tests_dir = base_dir.join(raw.tests_dir.unwrap_or_else(|| PathBuf::from(".")));
        let expected_dir = tests_dir.join(
            raw.expected_dir
                .unwrap_or_else(|| PathBuf::from("expected")),
        );

        let mut suites = HashMap::default();
        for (name, table) in raw.suite {
            let stage = name
                .parse::<Stage>()
                .map_err(|_| ConfigError::UnknownSuite { name: name.clone() })?;
            if suites.insert(stage, table).is_some() {
                return Err(ConfigError::DuplicateSuite { stage });
            }
        }

        Ok(Self {
            compiler: absolute(compiler),
            interpreter: absolute(interpreter),
            tests_dir,
            expected_dir,
            source_extension: raw.source_extension.unwrap_or_else(|| "usc".to_string()),
            artifact_extension: raw.artifact_extension.unwrap_or_else(|| "bc".to_string()),
            timeout: match raw.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => Some(Duration::from_secs(60)),
            },
            flags: raw.flags,
            suites,
        })
    }

    /// Check that both executables and the tests directory exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.compiler.is_file() {
            return Err(ConfigError::MissingExecutable {
                role: "compiler",
                path: self.compiler.clone(),
            });
        }
        if !self.interpreter.is_file() {
            return Err(ConfigError::MissingExecutable {
                role: "interpreter",
                path: self.interpreter.clone(),
            });
        }
        if !self.tests_dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                path: self.tests_dir.clone(),
            });
        }
        Ok(())
    }

    /// Explicit registrations for `stage`, if the config has any
    pub fn suite(&self, stage: Stage) -> Option<&SuiteTable> {
        self.suites.get(&stage)
    }

    pub fn set_suite(&mut self, stage: Stage, table: SuiteTable) {
        self.suites.insert(stage, table);
    }
}

fn base_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Child processes run inside the tests directory, so executable paths
/// must not depend on the harness's own working directory.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
